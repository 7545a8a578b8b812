//! # Warden Resilience - Guards for External Dependencies
//!
//! Every call Warden makes to the identity directory or the declarative
//! control-plane goes through the primitives in this crate.
//!
//! ## Key Components
//!
//! - [`CircuitBreaker`]: Per-dependency CLOSED / OPEN / HALF_OPEN guard
//! - [`BreakerRegistry`]: Injected map of dependency key to breaker
//! - [`backoff_delay`] / [`retry_with_backoff`]: Bounded exponential retry
//! - [`RateLimiter`]: Sliding windows keyed by caller and tier
//! - [`Clock`] / [`Sleeper`]: Time sources that tests can drive by hand
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_resilience::{BreakerRegistry, CircuitBreakerConfig, SystemClock};
//!
//! # async fn example() {
//! let breakers = BreakerRegistry::new(CircuitBreakerConfig::default(), Arc::new(SystemClock));
//! let directory = breakers.breaker("identity-directory");
//!
//! let outcome = directory
//!     .execute(|| async { Ok::<_, std::io::Error>("looked up") })
//!     .await;
//! # let _ = outcome;
//! # }
//! ```
//!
//! Breaker and limiter state are owned by explicit objects so each test can
//! build an isolated instance.

#![deny(unsafe_code)]

pub mod backoff;
pub mod breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod registry;

pub use backoff::{backoff_delay, retry_with_backoff};
pub use breaker::{BreakerHealth, BreakerPermit, CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, ManualSleeper, Sleeper, SystemClock, TokioSleeper};
pub use config::{CircuitBreakerConfig, RateLimitConfig, RetryPolicy, WindowConfig};
pub use error::{BreakerRejection, CallError, ConfigError, RateLimitRejection, Retryable};
pub use rate_limit::{OperationClass, RateLimiter, RateTier};
pub use registry::BreakerRegistry;
