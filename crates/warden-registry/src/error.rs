//! Registry error types

use thiserror::Error;
use warden_types::{Environment, WardenError};

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("Cluster already registered: {0}")]
    ClusterAlreadyExists(String),

    #[error("No default cluster is registered")]
    NoDefaultCluster,

    #[error("Cluster {existing} is already the default")]
    DuplicateDefault { existing: String },

    #[error("No cluster registered for environment {0}")]
    NoClusterForEnvironment(Environment),

    #[error("Invalid cluster configuration: {0}")]
    InvalidCluster(String),

    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("Caller {caller} is not authorized to {operation}")]
    Unauthorized { caller: String, operation: String },
}

impl From<RegistryError> for WardenError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unauthorized { caller, operation } => {
                WardenError::Unauthorized { caller, operation }
            }
            other => WardenError::validation(other.to_string()),
        }
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
