//! Axum handlers. Thin adapters from HTTP requests onto the engines.

pub mod geo;
pub mod health;
pub mod query;

use axum::http::StatusCode;

use crate::error::EngineError;

/// Map an engine failure onto a status code and message.
pub fn error_response(e: EngineError) -> (StatusCode, String) {
    let status = match &e {
        EngineError::InvalidCoordinate { .. } | EngineError::InvalidParameter { .. } => {
            StatusCode::BAD_REQUEST
        }
        EngineError::UnknownPoi(_) | EngineError::NoPathFound { .. } => StatusCode::NOT_FOUND,
        EngineError::DimensionMismatch { .. } | EngineError::DegenerateVector { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        EngineError::EmbeddingUnavailable { .. }
        | EngineError::UpstreamTimeout { .. }
        | EngineError::Provider { .. }
        | EngineError::Store { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {e}");
    }
    (status, e.to_string())
}
