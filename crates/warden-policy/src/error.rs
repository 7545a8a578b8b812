//! Policy error types

use thiserror::Error;
use warden_types::WardenError;

/// Errors raised while evaluating approval policies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Policy evaluation failed for {policy_id}: {reason}")]
    EvaluationFailed { policy_id: String, reason: String },

    #[error("Invalid policy configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<PolicyError> for WardenError {
    fn from(err: PolicyError) -> Self {
        WardenError::Internal(err.to_string())
    }
}

/// Result type for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;
