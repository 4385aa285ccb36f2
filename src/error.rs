//! Error handling

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

pub type AppResult<T> = Result<T, AppError>;

/// Peer service a downstream failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    FeatureCache,
    Prediction,
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::FeatureCache => write!(f, "feature cache"),
            Peer::Prediction => write!(f, "prediction service"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Validation errors
    #[error("Missing required columns: {0:?}")]
    MissingFeatures(Vec<String>),

    #[error("{0}")]
    Validation(String),

    // Resource errors
    #[error("{0}")]
    NotFound(String),

    // Model artifact errors
    #[error("Model artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("Failed to deserialize model artifact {}: {message}", path.display())]
    ArtifactCorrupt { path: PathBuf, message: String },

    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    // Capacity errors
    #[error("No model available in pool after {0:?}")]
    PoolExhausted(Duration),

    // Discovery errors
    #[error("Could not reach service discovery: {0}")]
    DiscoveryUnreachable(String),

    #[error("No healthy instances of {0}")]
    ServiceUnavailable(String),

    // Peer service errors
    #[error("{context}")]
    Downstream {
        peer: Peer,
        status: Option<u16>,
        detail: String,
        context: String,
    },

    // Generic errors
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable reason carried in every error body
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::MissingFeatures(_) | AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::ArtifactNotFound(_) | AppError::ArtifactCorrupt { .. } => "artifact_error",
            AppError::ModelNotLoaded(_) => "model_not_loaded",
            AppError::PoolExhausted(_) => "pool_exhausted",
            AppError::DiscoveryUnreachable(_) => "discovery_unreachable",
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::Downstream { peer: Peer::FeatureCache, .. } => "downstream_failure",
            AppError::Downstream { peer: Peer::Prediction, .. } => "downstream_prediction_failure",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingFeatures(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PoolExhausted(_)
            | AppError::DiscoveryUnreachable(_)
            | AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ArtifactNotFound(_)
            | AppError::ArtifactCorrupt { .. }
            | AppError::ModelNotLoaded(_)
            | AppError::Downstream { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        let mut body = json!({
            "error": message,
            "reason": self.reason(),
            "status": status.as_u16()
        });

        match &self {
            AppError::Downstream { peer, status: upstream, detail, .. } => {
                tracing::error!("Downstream {} failure ({:?}): {}", peer, upstream, detail);
                body["upstream_status"] = json!(upstream);
                // Keep structured upstream bodies structured
                body["detail"] = serde_json::from_str::<Value>(detail)
                    .unwrap_or_else(|_| Value::String(detail.clone()));
            }
            AppError::ArtifactNotFound(_)
            | AppError::ArtifactCorrupt { .. }
            | AppError::ModelNotLoaded(_)
            | AppError::Internal(_) => {
                tracing::error!("Internal error: {}", message);
            }
            AppError::PoolExhausted(_)
            | AppError::DiscoveryUnreachable(_)
            | AppError::ServiceUnavailable(_) => {
                tracing::warn!("Service unavailable: {}", message);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("Invalid JSON: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::MissingFeatures(vec!["a".into()]).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::PoolExhausted(Duration::from_secs(5)).status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(AppError::ServiceUnavailable("x".into()).status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_missing_features_message_names_columns() {
        let err = AppError::MissingFeatures(vec!["price".into(), "region".into()]);
        assert_eq!(err.to_string(), r#"Missing required columns: ["price", "region"]"#);
        assert_eq!(err.reason(), "validation_error");
    }

    #[test]
    fn test_downstream_reason_depends_on_peer() {
        let cache = AppError::Downstream {
            peer: Peer::FeatureCache,
            status: Some(404),
            detail: String::new(),
            context: "rejected".into(),
        };
        let predict = AppError::Downstream {
            peer: Peer::Prediction,
            status: None,
            detail: String::new(),
            context: "unreachable".into(),
        };
        assert_eq!(cache.reason(), "downstream_failure");
        assert_eq!(predict.reason(), "downstream_prediction_failure");
    }

    #[tokio::test]
    async fn test_downstream_body_preserves_upstream() {
        let err = AppError::Downstream {
            peer: Peer::FeatureCache,
            status: Some(404),
            detail: r#"{"error":"No data for client=A and item=Z"}"#.into(),
            context: "Feature cache rejected the time-features request".into(),
        };

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["reason"], "downstream_failure");
        assert_eq!(body["upstream_status"], 404);
        assert_eq!(body["detail"]["error"], "No data for client=A and item=Z");
    }
}
