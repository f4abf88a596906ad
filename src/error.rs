//! Error taxonomy for the scoring pipeline

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used by the scoring core
pub type Result<T> = std::result::Result<T, ScoringError>;

/// Failure category, used by callers to branch without matching on messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    ModelNotTrained,
    DimensionMismatch,
    CorruptArtifact,
    Persistence,
}

/// Errors raised by the feature deriver, classifier and training harness
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Malformed or missing input fields
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Classifier used before it was trained or loaded
    #[error("model is not trained; train or load a model first")]
    ModelNotTrained,

    /// Feature rows and labels disagree in length
    #[error("dimension mismatch: {features} feature rows but {labels} labels")]
    DimensionMismatch { features: usize, labels: usize },

    /// Artifact could be read but does not describe a usable model
    #[error("corrupt model artifact {}: {reason}", path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    /// I/O failure while reading or writing a model artifact or dataset
    #[error("I/O failed for {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScoringError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScoringError::InvalidInput(_) => ErrorKind::InvalidInput,
            ScoringError::ModelNotTrained => ErrorKind::ModelNotTrained,
            ScoringError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            ScoringError::CorruptArtifact { .. } => ErrorKind::CorruptArtifact,
            ScoringError::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ScoringError::CorruptArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScoringError::Persistence {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ScoringError::InvalidInput("x".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(ScoringError::ModelNotTrained.kind(), ErrorKind::ModelNotTrained);
        assert_eq!(
            ScoringError::DimensionMismatch {
                features: 3,
                labels: 2
            }
            .kind(),
            ErrorKind::DimensionMismatch
        );
        assert_eq!(
            ScoringError::corrupt("model.json", "bad").kind(),
            ErrorKind::CorruptArtifact
        );
    }

    #[test]
    fn test_error_messages() {
        let err = ScoringError::DimensionMismatch {
            features: 10,
            labels: 9,
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch: 10 feature rows but 9 labels"
        );

        let kind = serde_json::to_string(&ErrorKind::ModelNotTrained).unwrap();
        assert_eq!(kind, "\"model_not_trained\"");
    }
}
