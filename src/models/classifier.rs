//! Conversion classifier: lifecycle and concurrency around the random forest

use crate::error::{Result, ScoringError};
use crate::feature_extractor::{FeatureExtractor, FeatureVector};
use crate::models::forest::{ForestParams, RandomForest};
use crate::models::loader::{self, ModelArtifact, ModelMetadata};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Parameters of a usable model. Immutable once built.
#[derive(Debug)]
pub struct TrainedModel {
    pub forest: RandomForest,
    pub metadata: ModelMetadata,
}

/// Classifier lifecycle
#[derive(Debug, Clone, Default)]
pub enum ModelState {
    #[default]
    Untrained,
    Ready(Arc<TrainedModel>),
}

/// Binary "will convert" classifier shared by all requests.
///
/// Readers take a snapshot of the current model and predict without holding
/// the lock. `fit` and `load` build the new model first and then swap it in,
/// so readers see either the old or the new parameters, never a mix. The
/// writer gate serializes concurrent `fit`/`load` calls.
pub struct ConversionClassifier {
    params: ForestParams,
    extractor: FeatureExtractor,
    state: RwLock<ModelState>,
    writer: Mutex<()>,
}

impl ConversionClassifier {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            extractor: FeatureExtractor::new(),
            state: RwLock::new(ModelState::Untrained),
            writer: Mutex::new(()),
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn state(&self) -> ModelState {
        self.state.read().clone()
    }

    pub fn is_trained(&self) -> bool {
        matches!(*self.state.read(), ModelState::Ready(_))
    }

    /// Current model, or `ModelNotTrained`
    pub fn snapshot(&self) -> Result<Arc<TrainedModel>> {
        match &*self.state.read() {
            ModelState::Ready(model) => Ok(Arc::clone(model)),
            ModelState::Untrained => Err(ScoringError::ModelNotTrained),
        }
    }

    pub fn metadata(&self) -> Option<ModelMetadata> {
        self.snapshot().ok().map(|model| model.metadata.clone())
    }

    /// Train on `features` with parallel 0/1 `labels`, replacing any current model.
    ///
    /// Returns the installed model, which stays valid even if another load or
    /// fit replaces it afterwards.
    pub fn fit(&self, features: &[FeatureVector], labels: &[u8]) -> Result<Arc<TrainedModel>> {
        if features.len() != labels.len() {
            return Err(ScoringError::DimensionMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }

        let _writer = self.writer.lock();

        info!(
            samples = features.len(),
            n_estimators = self.params.n_estimators,
            max_depth = self.params.max_depth,
            seed = self.params.seed,
            "Training conversion classifier"
        );

        let matrix = self.extractor.to_matrix(features);
        let forest = RandomForest::fit(matrix.view(), labels, self.params)?;
        let model = TrainedModel {
            forest,
            metadata: ModelMetadata::new(features.len()),
        };

        info!(model_id = %model.metadata.model_id, "Conversion classifier trained");
        let model = Arc::new(model);
        *self.state.write() = ModelState::Ready(Arc::clone(&model));
        Ok(model)
    }

    /// Probability of conversion for each feature vector, in input order
    pub fn predict_probability(&self, features: &[FeatureVector]) -> Result<Vec<f64>> {
        let model = self.snapshot()?;
        let matrix = self.extractor.to_matrix(features);
        model.forest.predict_proba(matrix.view())
    }

    /// Relative contribution of each feature, aligned with `FEATURE_NAMES`
    pub fn feature_importance(&self) -> Result<Vec<f64>> {
        let model = self.snapshot()?;
        Ok(model.forest.feature_importances().to_vec())
    }

    /// Persist the current model
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let model = self.snapshot()?;
        let artifact = ModelArtifact::new(model.metadata.clone(), model.forest.clone());
        loader::save_artifact(&artifact, path)
    }

    /// Replace the current model with one read from disk
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<ModelMetadata> {
        let _writer = self.writer.lock();

        let artifact = loader::load_artifact(path)?;
        let metadata = artifact.metadata.clone();
        let model = TrainedModel {
            forest: artifact.forest,
            metadata: artifact.metadata,
        };

        *self.state.write() = ModelState::Ready(Arc::new(model));
        Ok(metadata)
    }
}

impl Default for ConversionClassifier {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}
