//! Model artifact persistence

use crate::error::{Result, ScoringError};
use crate::feature_extractor::FEATURE_NAMES;
use crate::models::forest::RandomForest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Artifact layout version written by this build
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Provenance of a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
}

impl ModelMetadata {
    pub fn new(training_samples: usize) -> Self {
        Self {
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            training_samples,
        }
    }
}

/// On-disk form of a trained classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub metadata: ModelMetadata,
    /// Feature order the forest was trained on
    pub feature_names: Vec<String>,
    pub forest: RandomForest,
}

impl ModelArtifact {
    pub fn new(metadata: ModelMetadata, forest: RandomForest) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            metadata,
            feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            forest,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {} (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            ));
        }
        if self.feature_names != FEATURE_NAMES {
            return Err(format!(
                "feature layout {:?} does not match {:?}",
                self.feature_names, FEATURE_NAMES
            ));
        }
        if self.forest.n_features() != FEATURE_NAMES.len() {
            return Err(format!(
                "forest expects {} features, extractor produces {}",
                self.forest.n_features(),
                FEATURE_NAMES.len()
            ));
        }
        self.forest.validate()
    }
}

/// Write an artifact as JSON.
///
/// The file is written to a uniquely named sibling and renamed into place, so
/// a failed save never leaves a truncated artifact behind and concurrent saves
/// to one path do not share a staging file.
pub fn save_artifact<P: AsRef<Path>>(artifact: &ModelArtifact, path: P) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ScoringError::persistence(parent, e))?;
    }

    let staging = staging_path(path);
    let written = write_json(artifact, &staging).and_then(|()| {
        fs::rename(&staging, path).map_err(|e| ScoringError::persistence(path, e))
    });

    if written.is_err() {
        let _ = fs::remove_file(&staging);
    }
    written?;

    info!(
        path = %path.display(),
        model_id = %artifact.metadata.model_id,
        trees = artifact.forest.n_trees(),
        "Model artifact saved"
    );
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.partial", Uuid::new_v4().simple()));
    path.with_file_name(name)
}

fn write_json(artifact: &ModelArtifact, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| ScoringError::persistence(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, artifact)
        .map_err(|e| ScoringError::persistence(path, e.into()))?;
    writer
        .flush()
        .map_err(|e| ScoringError::persistence(path, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| ScoringError::persistence(path, e))
}

/// Read and validate an artifact
pub fn load_artifact<P: AsRef<Path>>(path: P) -> Result<ModelArtifact> {
    let path = path.as_ref();

    info!(path = %path.display(), "Loading model artifact");

    let file = File::open(path).map_err(|e| ScoringError::persistence(path, e))?;
    let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        if e.is_io() {
            ScoringError::persistence(path, e.into())
        } else {
            ScoringError::corrupt(path, e.to_string())
        }
    })?;

    artifact
        .validate()
        .map_err(|reason| ScoringError::corrupt(path, reason))?;

    info!(
        path = %path.display(),
        model_id = %artifact.metadata.model_id,
        trees = artifact.forest.n_trees(),
        "Model artifact loaded"
    );

    Ok(artifact)
}
