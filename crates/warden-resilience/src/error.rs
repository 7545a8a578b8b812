//! Error types for resilience primitives.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::breaker::CircuitState;
use crate::rate_limit::RateTier;

/// Classifies an error as transient.
///
/// Only retryable errors count toward opening a breaker and only retryable
/// errors are retried by [`crate::retry_with_backoff`].
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Whether the error is a definitive answer from a healthy dependency,
    /// such as a name conflict on create. Breakers settle these as success.
    fn is_healthy_response(&self) -> bool {
        false
    }
}

impl Retryable for std::io::Error {
    fn is_retryable(&self) -> bool {
        use std::io::ErrorKind;
        matches!(
            self.kind(),
            ErrorKind::TimedOut
                | ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::Interrupted
                | ErrorKind::WouldBlock
        )
    }
}

/// A breaker refused to admit a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit for {dependency} is {state}; retry after {}ms", retry_after.as_millis())]
pub struct BreakerRejection {
    pub dependency: String,
    pub state: CircuitState,
    pub retry_after: Duration,
}

/// Outcome of a call made through a breaker.
#[derive(Debug)]
pub enum CallError<E> {
    /// The breaker did not admit the call.
    Rejected(BreakerRejection),
    /// The call ran and failed.
    Failed(E),
}

impl<E> CallError<E> {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Rejected(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(rejection) => write!(f, "{rejection}"),
            Self::Failed(err) => write!(f, "{err}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CallError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            Self::Failed(err) => Some(err),
        }
    }
}

/// A rate-limit window is exhausted for a caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{tier} rate limit exceeded for {caller}; retry after {}ms", retry_after.as_millis())]
pub struct RateLimitRejection {
    pub tier: RateTier,
    pub caller: String,
    pub retry_after: Duration,
}

/// Invalid resilience configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid resilience configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
