use crate::models::PoiId;

/// Failures surfaced by the retrieval, nearby and route engines.
///
/// Empty result sets are never errors: "nothing within 50 m" is `Ok(vec![])`,
/// while "the store could not be reached" is [`EngineError::Store`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid coordinate: lat {lat}, lon {lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("unknown point of interest: {0}")]
    UnknownPoi(PoiId),

    #[error("no walkable path from {from} to {to}")]
    NoPathFound { from: PoiId, to: PoiId },

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("degenerate vector: {reason}")]
    DegenerateVector { reason: String },

    #[error("embedding unavailable: {reason}")]
    EmbeddingUnavailable { reason: String },

    #[error("{operation} timed out after {timeout_ms} ms")]
    UpstreamTimeout {
        operation: String,
        timeout_ms: u64,
    },

    #[error("provider error: {reason}")]
    Provider { reason: String },

    #[error("store error: {reason}")]
    Store { reason: String },
}

impl EngineError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }

    pub fn provider(reason: impl Into<String>) -> Self {
        Self::Provider {
            reason: reason.into(),
        }
    }

    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store {
            reason: reason.into(),
        }
    }

    /// Whether a second attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTimeout { .. } | Self::Provider { .. } | Self::Store { .. }
        )
    }

    /// True for failures of an external dependency rather than of the request.
    pub fn is_degraded_service(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingUnavailable { .. }
                | Self::UpstreamTimeout { .. }
                | Self::Provider { .. }
                | Self::Store { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
