//! Observability error types

use thiserror::Error;

/// Errors from audit sinks, metric registration, or tracing setup
#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Tracing initialization failed: {0}")]
    TracingInit(String),

    #[error("Audit emitter is shut down")]
    EmitterClosed,
}

/// Result type for observability operations
pub type Result<T> = std::result::Result<T, ObservabilityError>;
