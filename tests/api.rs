//! HTTP contract tests driven through the router

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use crm_scoring::config::AppConfig;
use crm_scoring::models::forest::ForestParams;
use crm_scoring::server::{create_router, AppState};
use crm_scoring::service::ScoringService;
use crm_scoring::training::SyntheticGenerator;
use crm_scoring::types::SegmentThresholds;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn untrained_service() -> Arc<ScoringService> {
    Arc::new(ScoringService::new(
        ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        },
        SegmentThresholds::default(),
    ))
}

fn trained_service() -> Arc<ScoringService> {
    let service = untrained_service();
    service
        .train(&SyntheticGenerator::new(42).generate(300))
        .unwrap();
    service
}

fn app(service: Arc<ScoringService>) -> Router {
    create_router(AppState::new(service, AppConfig::default()))
}

fn client(customer_id: i64, total_spent: f64) -> Value {
    json!({
        "customer_id": customer_id,
        "days_since_last_contact": 15,
        "total_contacts": 25,
        "total_spent": total_spent,
        "emails_sent": 50,
        "emails_opened": 35,
        "website_visits": 120,
        "customer_age_days": 365
    })
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let (status, body) = send(app(untrained_service()), "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["score"], "/api/score");
}

#[tokio::test]
async fn test_health_reports_model_state() {
    let (status, body) = send(app(untrained_service()), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], false);

    let (_, body) = send(app(trained_service()), "GET", "/health", None).await;
    assert_eq!(body["model_loaded"], true);
    assert!(body["model_id"].is_string());
}

#[tokio::test]
async fn test_untrained_returns_503() {
    let service = untrained_service();

    let (status, body) = send(app(service.clone()), "POST", "/api/score", Some(client(1, 100.0))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "model_not_trained");
    assert_eq!(body["status"], 503);

    let (status, _) = send(app(service.clone()), "GET", "/api/stats", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let batch = json!({ "clients": [client(1, 100.0)] });
    let (status, _) = send(app(service), "POST", "/api/batch_score", Some(batch)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_score_single_client() {
    let (status, body) = send(
        app(trained_service()),
        "POST",
        "/api/score",
        Some(client(12345, 5000.0)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customer_id"], 12345);

    let score = body["score"].as_u64().unwrap();
    assert!(score <= 100);

    let (segment, recommendation) = if score >= 70 {
        ("Hot", "high priority, contact immediately")
    } else if score >= 40 {
        ("Warm", "medium priority, follow up within 48h")
    } else {
        ("Cold", "low priority, automated nurture")
    };
    assert_eq!(body["segment"], segment);
    assert_eq!(body["recommendation"], recommendation);
}

#[tokio::test]
async fn test_batch_matches_single_scores() {
    let service = trained_service();
    let clients = [client(1, 8000.0), client(2, 500.0), client(3, 3000.0)];

    let (status, body) = send(
        app(service.clone()),
        "POST",
        "/api/batch_score",
        Some(json!({ "clients": clients })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);

    let mut total = 0;
    for (result, single) in results.iter().zip(&clients) {
        let (_, scored) = send(app(service.clone()), "POST", "/api/score", Some(single.clone())).await;
        assert_eq!(result["customer_id"], scored["customer_id"]);
        assert_eq!(result["score"], scored["score"]);
        assert_eq!(result["segment"], scored["segment"]);
        total += scored["score"].as_u64().unwrap();
    }

    let stats = &body["statistics"];
    assert_eq!(stats["total_clients"], 3);
    let counted = stats["hot_leads"].as_u64().unwrap()
        + stats["warm_leads"].as_u64().unwrap()
        + stats["cold_leads"].as_u64().unwrap();
    assert_eq!(counted, 3);
    let average = stats["average_score"].as_f64().unwrap();
    assert!((average - total as f64 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let service = trained_service();

    let (status, body) = send(
        app(service.clone()),
        "POST",
        "/api/batch_score",
        Some(json!({ "clients": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "invalid_input");

    let mut negative = client(1, 100.0);
    negative["total_spent"] = json!(-1.0);
    let (status, _) = send(app(service.clone()), "POST", "/api/score", Some(negative)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        app(service.clone()),
        "POST",
        "/api/score",
        Some(json!({ "customer_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let duplicate = json!({ "clients": [client(7, 1.0), client(7, 2.0)] });
    let (status, _) = send(app(service), "POST", "/api/batch_score", Some(duplicate)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_stats_after_training() {
    let (status, body) = send(app(trained_service()), "GET", "/api/stats", None).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["model_type"], "RandomForestClassifier");
    assert_eq!(body["n_estimators"], 10);
    assert_eq!(body["max_depth"], 10);
    assert_eq!(body["segments"]["Hot"], "Score >= 70");
    assert_eq!(body["segments"]["Warm"], "40 <= Score < 70");
    assert_eq!(body["segments"]["Cold"], "Score < 40");

    let importance = body["feature_importance"].as_object().unwrap();
    assert_eq!(importance.len(), 7);
    let sum: f64 = importance.values().map(|v| v.as_f64().unwrap()).sum();
    assert!((sum - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_load_model_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    trained_service().save_model(Some(&path)).unwrap();

    let service = untrained_service();
    let uri = format!("/api/load_model?model_path={}", path.display());
    let (status, body) = send(app(service.clone()), "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["model_id"].is_string());
    assert!(service.is_ready());

    let missing = format!("/api/load_model?model_path={}", dir.path().join("nope.json").display());
    let (status, body) = send(app(service), "POST", &missing, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "persistence");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let service = trained_service();
    send(app(service.clone()), "POST", "/api/score", Some(client(1, 10.0))).await;

    let (status, body) = send(app(service), "GET", "/api/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customers_scored"], 1);
    assert_eq!(body["requests"], 1);
}
