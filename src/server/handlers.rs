//! Route handlers

use crate::metrics::MetricsSnapshot;
use crate::server::error::ApiResult;
use crate::server::extract::ValidatedJson;
use crate::server::AppState;
use crate::service::{BatchScoring, HealthStatus, ModelInfo};
use crate::types::customer::CustomerRecord;
use crate::types::score::Segment;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Scoring response for one customer
#[derive(Debug, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub customer_id: i64,
    pub score: u8,
    pub segment: Segment,
    pub recommendation: String,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "unique_customer_ids"))]
pub struct BatchScoringRequest {
    #[validate(length(min = 1, message = "clients must not be empty"), nested)]
    pub clients: Vec<CustomerRecord>,
}

fn unique_customer_ids(request: &BatchScoringRequest) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(request.clients.len());
    if request.clients.iter().all(|client| seen.insert(client.customer_id)) {
        Ok(())
    } else {
        let mut error = ValidationError::new("duplicate_customer_id");
        error.message = Some("customer_id must be unique within a batch".into());
        Err(error)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoadModelParams {
    /// Artifact to load; defaults to the configured path
    pub model_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct LoadModelResponse {
    pub message: &'static str,
    pub model_path: PathBuf,
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "CRM Conversion Scoring API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "score": "/api/score",
            "batch_score": "/api/batch_score",
            "stats": "/api/stats",
            "load_model": "/api/load_model",
            "metrics": "/api/metrics"
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.service.health())
}

pub async fn score(
    State(state): State<AppState>,
    ValidatedJson(client): ValidatedJson<CustomerRecord>,
) -> ApiResult<Json<ScoreResponse>> {
    let result = state.service.score_one(&client)?;

    Ok(Json(ScoreResponse {
        customer_id: result.customer_id,
        score: result.score,
        segment: result.segment,
        recommendation: result.segment.recommendation().to_string(),
    }))
}

pub async fn batch_score(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<BatchScoringRequest>,
) -> ApiResult<Json<BatchScoring>> {
    let service = Arc::clone(&state.service);
    let scoring = tokio::task::spawn_blocking(move || service.score_batch(&request.clients)).await??;
    Ok(Json(scoring))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<ModelInfo>> {
    Ok(Json(state.service.model_info()?))
}

pub async fn load_model(
    State(state): State<AppState>,
    Query(params): Query<LoadModelParams>,
) -> ApiResult<Json<LoadModelResponse>> {
    let service = Arc::clone(&state.service);
    let model_path = params
        .model_path
        .unwrap_or_else(|| service.artifact_path().to_path_buf());

    let path = model_path.clone();
    let metadata = tokio::task::spawn_blocking(move || service.load_model(Some(&path))).await??;

    Ok(Json(LoadModelResponse {
        message: "Model loaded successfully",
        model_path,
        model_id: metadata.model_id,
        trained_at: metadata.trained_at,
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.service.metrics().snapshot())
}
