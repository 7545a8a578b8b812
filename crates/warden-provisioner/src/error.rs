//! Error types for the provisioner's external boundaries

use std::time::Duration;

use thiserror::Error;
use warden_resilience::Retryable;
use warden_types::WardenError;

use crate::control_plane::StoredResource;

/// Identity directory errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The object does not exist as the requested principal type
    #[error("principal {principal_id} not found")]
    NotFound { principal_id: String },

    #[error("directory call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Server-side failure (5xx)
    #[error("directory returned {status}: {message}")]
    Unavailable { status: u16, message: String },

    /// Throttled by the directory (429)
    #[error("directory throttled the request")]
    Throttled { retry_after: Option<Duration> },

    /// Any other client error (4xx other than 404/429)
    #[error("directory rejected the request: {0}")]
    Rejected(String),
}

impl Retryable for DirectoryError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Unavailable { .. } | Self::Throttled { .. }
        )
    }
}

/// Declarative control-plane errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlPlaneError {
    /// A resource with the same name exists; carries what is stored
    #[error("resource {} already exists", .0.resource.name())]
    AlreadyExists(Box<StoredResource>),

    #[error("resource {0} not found")]
    NotFound(String),

    #[error("control-plane call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("control-plane returned {status}: {message}")]
    Unavailable { status: u16, message: String },

    /// The control-plane refused the resource as malformed
    #[error("control-plane rejected the resource: {0}")]
    Invalid(String),
}

impl Retryable for ControlPlaneError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable { .. })
    }

    fn is_healthy_response(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to initialize observability: {0}")]
    Observability(#[from] warden_observability::ObservabilityError),
}

impl From<warden_registry::RegistryError> for ConfigError {
    fn from(err: warden_registry::RegistryError) -> Self {
        Self::Invalid(err.to_string())
    }
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl From<warden_resilience::ConfigError> for ConfigError {
    fn from(err: warden_resilience::ConfigError) -> Self {
        Self::Invalid(err.to_string())
    }
}

impl From<warden_policy::PolicyError> for ConfigError {
    fn from(err: warden_policy::PolicyError) -> Self {
        Self::Invalid(err.to_string())
    }
}

impl From<WardenError> for ConfigError {
    fn from(err: WardenError) -> Self {
        Self::Invalid(err.to_string())
    }
}
