//! Error taxonomy shared across the provisioning pipeline
//!
//! Internal crates raise their own error enums and map them into
//! [`WardenError`] at the orchestrator boundary. Callers only ever see a
//! [`FailureReport`]: a stable code, a sanitized message, and the
//! correlation id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::ids::CorrelationId;

/// Errors raised while provisioning or querying access grants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WardenError {
    /// Malformed input or unknown role key.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// The principal does not exist in the identity directory.
    #[error("principal {principal_id} was not found in the identity directory")]
    PrincipalNotFound { principal_id: String },

    /// Breaker open, or the dependency timed out / returned a server error.
    #[error("dependency {dependency} unavailable: {reason}")]
    DependencyUnavailable {
        dependency: String,
        reason: String,
        retry_after: Duration,
    },

    /// A divergent assignment already exists under the deterministic name.
    #[error("assignment {name} already exists with a divergent specification")]
    Conflict { name: String },

    /// A rate-limit window for the caller is exhausted.
    #[error("rate limit exceeded for the {tier} tier")]
    RateLimited { tier: String, retry_after: Duration },

    /// An approval policy denied the request outright.
    #[error("denied by policy {policy_id}: {reason}")]
    PolicyDenied { policy_id: String, reason: String },

    /// The caller lacks the privilege for an administrative operation.
    #[error("caller {caller} is not authorized to {operation}")]
    Unauthorized { caller: String, operation: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl WardenError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn unavailable(
        dependency: impl Into<String>,
        reason: impl Into<String>,
        retry_after: Duration,
    ) -> Self {
        Self::DependencyUnavailable {
            dependency: dependency.into(),
            reason: reason.into(),
            retry_after,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::ValidationError,
            Self::PrincipalNotFound { .. } => ErrorCode::PrincipalNotFound,
            Self::DependencyUnavailable { .. } => ErrorCode::DependencyUnavailable,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::PolicyDenied { .. } => ErrorCode::PolicyDenied,
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Whether repeating the same request later can succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DependencyUnavailable { .. } | Self::RateLimited { .. }
        )
    }

    /// Suggested delay before a retry, when one applies.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::DependencyUnavailable { retry_after, .. }
            | Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// HTTP-equivalent status class for the caller-facing surface.
    pub fn status_code(&self) -> u16 {
        self.code().status_code()
    }

    /// Message safe to show the caller. Dependency and internal error text is
    /// replaced, everything else only echoes caller-supplied values.
    pub fn caller_message(&self) -> String {
        match self {
            Self::DependencyUnavailable {
                dependency,
                retry_after,
                ..
            } => format!(
                "{} is temporarily unavailable; retry after {}ms",
                dependency,
                retry_after.as_millis()
            ),
            Self::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }

    /// Build the sanitized report returned to the caller.
    pub fn to_report(&self, step: ProvisioningStep, correlation_id: &CorrelationId) -> FailureReport {
        FailureReport {
            code: self.code(),
            message: self.caller_message(),
            correlation_id: correlation_id.clone(),
            step,
            retry_after_ms: self.retry_after().map(|d| d.as_millis() as u64),
        }
    }
}

/// Stable machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    PrincipalNotFound,
    DependencyUnavailable,
    Conflict,
    RateLimited,
    PolicyDenied,
    Unauthorized,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::PrincipalNotFound => "PRINCIPAL_NOT_FOUND",
            Self::DependencyUnavailable => "DEPENDENCY_UNAVAILABLE",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::PolicyDenied => "POLICY_DENIED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::ValidationError => 400,
            Self::PrincipalNotFound => 404,
            Self::Conflict => 409,
            Self::RateLimited => 429,
            Self::PolicyDenied | Self::Unauthorized => 403,
            Self::DependencyUnavailable => 503,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step of the request lifecycle a failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisioningStep {
    Intake,
    RateLimit,
    Approval,
    PrincipalValidation,
    Scoping,
    Apply,
    Status,
    Remove,
    Registry,
}

impl ProvisioningStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::RateLimit => "rate-limit",
            Self::Approval => "approval",
            Self::PrincipalValidation => "principal-validation",
            Self::Scoping => "scoping",
            Self::Apply => "apply",
            Self::Status => "status",
            Self::Remove => "remove",
            Self::Registry => "registry",
        }
    }
}

impl fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-facing failure description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub code: ErrorCode,
    pub message: String,
    pub correlation_id: CorrelationId,
    pub step: ProvisioningStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl FailureReport {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::DependencyUnavailable | ErrorCode::RateLimited
        )
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (step={}, correlation={})",
            self.code, self.message, self.step, self.correlation_id
        )
    }
}

/// Result type for Warden operations
pub type Result<T> = std::result::Result<T, WardenError>;
