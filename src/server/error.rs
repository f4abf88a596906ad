//! HTTP error responses

use crate::error::{ErrorKind, ScoringError};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// Failure raised by the scoring pipeline
    Scoring(ScoringError),
    /// Body could not be parsed into the request type
    Rejection { status: StatusCode, message: String },
    /// Body parsed but failed range or schema checks
    Validation(String),
    /// Unexpected server-side failure
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Scoring(err) => match err.kind() {
                ErrorKind::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::DimensionMismatch => StatusCode::BAD_REQUEST,
                ErrorKind::ModelNotTrained => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::CorruptArtifact | ErrorKind::Persistence => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Rejection { status, .. } => *status,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Scoring(err) => match err.kind() {
                ErrorKind::InvalidInput => "invalid_input",
                ErrorKind::ModelNotTrained => "model_not_trained",
                ErrorKind::DimensionMismatch => "dimension_mismatch",
                ErrorKind::CorruptArtifact => "corrupt_artifact",
                ErrorKind::Persistence => "persistence",
            },
            ApiError::Rejection { .. } | ApiError::Validation(_) => "invalid_input",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let message = match self {
            ApiError::Scoring(err) => {
                if status.is_server_error() && !matches!(err, ScoringError::ModelNotTrained) {
                    tracing::error!(kind, error = %err, "Scoring request failed");
                }
                err.to_string()
            }
            ApiError::Rejection { message, .. } | ApiError::Validation(message) => message,
            ApiError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<ScoringError> for ApiError {
    fn from(err: ScoringError) -> Self {
        ApiError::Scoring(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejection {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
