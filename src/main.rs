//! CRM Conversion Scoring Service - Main Entry Point
//!
//! Serves conversion scores and Hot/Warm/Cold segments over HTTP. A trained
//! model artifact is loaded at startup when present, or later through
//! `POST /api/load_model`.

use anyhow::Result;
use crm_scoring::{
    config::AppConfig,
    metrics::MetricsReporter,
    server::{self, AppState},
    service::ScoringService,
    telemetry,
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    telemetry::init_tracing(&config.logging)?;

    info!("Starting CRM Conversion Scoring Service");
    info!(
        "Segments: Hot >= {}, Warm >= {}, Cold below; forest: {} trees, depth {}",
        config.segmentation.hot,
        config.segmentation.warm,
        config.model.n_estimators,
        config.model.max_depth
    );

    let service = Arc::new(ScoringService::from_config(&config));

    if config.model.autoload {
        let loader = Arc::clone(&service);
        match tokio::task::spawn_blocking(move || loader.autoload()).await? {
            Ok(true) => info!("Model loaded at startup"),
            Ok(false) => {}
            Err(e) => error!(error = %e, "Failed to load model at startup; serving untrained"),
        }
    }

    // Start metrics reporter
    let metrics = service.metrics();
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(Arc::clone(&metrics), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let state = AppState::new(service, config);
    server::serve(state).await?;

    // Print final summary
    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}
