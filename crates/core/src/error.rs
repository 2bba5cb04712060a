// Error types for stores and the reconciliation engine

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Alert not found
    #[error("alert not found: {0}")]
    AlertNotFound(Uuid),

    /// Device not found
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Backend I/O failure (transient)
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn database(msg: impl Into<String>) -> Self {
        StoreError::Database(msg.into())
    }
}

/// Errors raised by the reconciliation engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Alert not found
    #[error("alert not found: {0}")]
    AlertNotFound(Uuid),

    /// Device not found
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Telemetry payload rejected before reconciliation
    #[error("invalid telemetry: {0}")]
    InvalidTelemetry(String),
}

/// Errors raised while delivering notifications
#[derive(Debug, Error)]
pub enum NotifyError {
    /// No recipients configured for the alert
    #[error("no recipients for alert {0}")]
    NoRecipients(Uuid),

    /// Transport-level delivery failure
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Store error while recording the notification
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration parsing errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: String, value: String },
}
