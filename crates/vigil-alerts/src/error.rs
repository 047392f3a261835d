//! Error types for the alert domain

use crate::status::AlertStatus;
use vigil_cache::CacheError;

/// Alert domain error
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// Status value outside the known enumeration
    #[error("unknown alert status: {0}")]
    UnknownStatus(String),

    /// Selected status equals the current one
    #[error("alert already has status {0}")]
    StatusUnchanged(AlertStatus),

    /// Cached record does not decode as an alert
    #[error("invalid alert record: {0}")]
    Decode(#[from] serde_json::Error),

    /// Cache operation failed
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Result type for alert operations
pub type AlertResult<T> = Result<T, AlertError>;
