//! Error types for the placement engine
//!
//! A valid query with zero matches is not an error. It comes back as an
//! empty sequence or a zero-count metadata block.

/// Main error type for placement queries and lifecycle writes
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlacementError {
    /// Whether the failure was caused by the caller's input rather than the store
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier(_) | Self::NotFound(_) | Self::InvalidTransition(_)
        )
    }
}

impl From<mongodb::error::Error> for PlacementError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<bson::oid::Error> for PlacementError {
    fn from(err: bson::oid::Error) -> Self {
        Self::InvalidIdentifier(err.to_string())
    }
}

impl From<bson::de::Error> for PlacementError {
    fn from(err: bson::de::Error) -> Self {
        Self::Internal(format!("BSON decode error: {}", err))
    }
}

impl From<bson::ser::Error> for PlacementError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Internal(format!("BSON encode error: {}", err))
    }
}

impl From<serde_json::Error> for PlacementError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for PlacementError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type alias for placement operations
pub type Result<T> = std::result::Result<T, PlacementError>;
