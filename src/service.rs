//! Scoring service: feature deriver, classifier and scorer behind one handle

use crate::config::{AppConfig, TrainingConfig};
use crate::dataset::LabeledDataset;
use crate::error::{Result, ScoringError};
use crate::feature_extractor::{FeatureExtractor, FEATURE_NAMES};
use crate::metrics::ScoringMetrics;
use crate::models::classifier::ConversionClassifier;
use crate::models::forest::ForestParams;
use crate::models::loader::ModelMetadata;
use crate::scorer::Scorer;
use crate::training::{TrainingHarness, TrainingOutcome};
use crate::types::customer::CustomerRecord;
use crate::types::score::{BatchStatistics, ScoreResult, SegmentThresholds};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MODEL_TYPE: &str = "RandomForestClassifier";

/// Scores of a batch together with their aggregate figures
#[derive(Debug, Clone, Serialize)]
pub struct BatchScoring {
    pub results: Vec<ScoreResult>,
    pub statistics: BatchStatistics,
}

/// Description of the loaded model
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_type: &'static str,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub feature_importance: BTreeMap<String, f64>,
    pub segments: BTreeMap<String, String>,
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
}

/// Liveness report
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<DateTime<Utc>>,
}

/// Shared scoring pipeline. One instance serves every request.
pub struct ScoringService {
    extractor: FeatureExtractor,
    classifier: ConversionClassifier,
    scorer: Scorer,
    training: TrainingConfig,
    artifact_path: PathBuf,
    metrics: Arc<ScoringMetrics>,
}

impl ScoringService {
    pub fn new(params: ForestParams, thresholds: SegmentThresholds) -> Self {
        let defaults = AppConfig::default();
        Self {
            extractor: FeatureExtractor::new(),
            classifier: ConversionClassifier::new(params),
            scorer: Scorer::new(thresholds),
            training: defaults.training,
            artifact_path: defaults.model.artifact_path,
            metrics: Arc::new(ScoringMetrics::new()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            classifier: ConversionClassifier::new(config.forest_params()),
            scorer: Scorer::new(config.segmentation),
            training: config.training.clone(),
            artifact_path: config.model.artifact_path.clone(),
            metrics: Arc::new(ScoringMetrics::new()),
        }
    }

    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }

    pub fn classifier(&self) -> &ConversionClassifier {
        &self.classifier
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn metrics(&self) -> Arc<ScoringMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn is_ready(&self) -> bool {
        self.classifier.is_trained()
    }

    /// Score one customer
    pub fn score_one(&self, record: &CustomerRecord) -> Result<ScoreResult> {
        let started = Instant::now();
        let result = self.score_records(std::slice::from_ref(record));

        match result {
            Ok(mut results) => {
                self.metrics.record_request(started.elapsed(), &results);
                results.pop().ok_or_else(|| {
                    ScoringError::InvalidInput("no score produced".to_string())
                })
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Score several customers against a single model snapshot.
    ///
    /// The batch fails as a whole: either every record gets a score or none does.
    pub fn score_batch(&self, records: &[CustomerRecord]) -> Result<BatchScoring> {
        if records.is_empty() {
            return Err(self.fail(ScoringError::InvalidInput(
                "batch must contain at least one client".to_string(),
            )));
        }

        let started = Instant::now();
        let results = self.score_records(records).map_err(|e| self.fail(e))?;
        let statistics = BatchStatistics::from_results(&results);

        self.metrics.record_request(started.elapsed(), &results);
        debug!(
            clients = statistics.total_clients,
            hot = statistics.hot_leads,
            warm = statistics.warm_leads,
            cold = statistics.cold_leads,
            "Batch scored"
        );

        Ok(BatchScoring {
            results,
            statistics,
        })
    }

    fn score_records(&self, records: &[CustomerRecord]) -> Result<Vec<ScoreResult>> {
        let features = self.extractor.extract_batch(records);
        let probabilities = self.classifier.predict_probability(&features)?;

        Ok(records
            .iter()
            .zip(probabilities)
            .map(|(record, p)| self.scorer.score(record.customer_id, p))
            .collect())
    }

    /// Train on `dataset` with a held-out evaluation split
    pub fn train(&self, dataset: &LabeledDataset) -> Result<TrainingOutcome> {
        let harness = TrainingHarness::new(self.training.clone(), self.scorer);
        let outcome = harness.run(&self.classifier, dataset).map_err(|e| self.fail(e))?;
        self.metrics.record_model_installed();
        Ok(outcome)
    }

    /// Load an artifact, defaulting to the configured path
    pub fn load_model(&self, path: Option<&Path>) -> Result<ModelMetadata> {
        let path = path.unwrap_or(self.artifact_path.as_path());
        let metadata = self.classifier.load(path).map_err(|e| self.fail(e))?;
        self.metrics.record_model_installed();

        info!(
            path = %path.display(),
            model_id = %metadata.model_id,
            trained_at = %metadata.trained_at,
            "Model installed"
        );
        Ok(metadata)
    }

    /// Load the configured artifact if it exists. Returns whether a model was loaded.
    pub fn autoload(&self) -> Result<bool> {
        if !self.artifact_path.exists() {
            warn!(
                path = %self.artifact_path.display(),
                "Model artifact not found; serving untrained until a model is loaded"
            );
            return Ok(false);
        }
        self.load_model(None)?;
        Ok(true)
    }

    /// Save the current model, defaulting to the configured path
    pub fn save_model(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = path.unwrap_or(self.artifact_path.as_path());
        self.classifier.save(path).map_err(|e| self.fail(e))?;
        Ok(path.to_path_buf())
    }

    /// Parameters, feature importance and segment policy of the current model
    pub fn model_info(&self) -> Result<ModelInfo> {
        let model = self.classifier.snapshot().map_err(|e| self.fail(e))?;
        let params = model.forest.params();

        let feature_importance = FEATURE_NAMES
            .iter()
            .zip(model.forest.feature_importances())
            .map(|(name, &weight)| (name.to_string(), weight))
            .collect();

        let segments = self
            .scorer
            .thresholds()
            .describe()
            .into_iter()
            .map(|(segment, range)| (segment.to_string(), range))
            .collect();

        Ok(ModelInfo {
            model_type: MODEL_TYPE,
            n_estimators: params.n_estimators,
            max_depth: params.max_depth,
            feature_importance,
            segments,
            model_id: model.metadata.model_id,
            trained_at: model.metadata.trained_at,
            training_samples: model.metadata.training_samples,
        })
    }

    pub fn health(&self) -> HealthStatus {
        let metadata = self.classifier.metadata();
        HealthStatus {
            status: "healthy",
            model_loaded: metadata.is_some(),
            model_id: metadata.as_ref().map(|m| m.model_id),
            trained_at: metadata.as_ref().map(|m| m.trained_at),
        }
    }

    fn fail(&self, error: ScoringError) -> ScoringError {
        self.metrics.record_error(error.kind());
        error
    }
}
