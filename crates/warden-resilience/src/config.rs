//! Resilience configuration.
//!
//! Durations are written in milliseconds in configuration files
//! (`reset_timeout_ms = 30000`) and exposed as [`Duration`] in code.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rate_limit::RateTier;

/// Serde adapter storing a [`Duration`] as integer milliseconds.
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive retryable failures that open the circuit.
    pub failure_threshold: u32,

    /// Time to wait before the first half-open probe.
    #[serde(rename = "reset_timeout_ms", with = "millis")]
    pub reset_timeout: Duration,

    /// Concurrent probes allowed while half-open.
    pub half_open_max_probes: u32,

    /// Factor applied to the cooldown each time a probe fails.
    pub cooldown_multiplier: f64,

    /// Upper bound on the cooldown after repeated probe failures.
    #[serde(rename = "max_cooldown_ms", with = "millis")]
    pub max_cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_max_probes: 1,
            cooldown_multiplier: 2.0,
            max_cooldown: Duration::from_secs(300),
        }
    }
}

impl CircuitBreakerConfig {
    /// Cooldown to apply when opening after `reopens` consecutive failed probes.
    pub fn cooldown_for(&self, reopens: u32) -> Duration {
        if reopens == 0 || self.cooldown_multiplier <= 1.0 {
            return self.reset_timeout;
        }
        let factor = self.cooldown_multiplier.powi(reopens.min(32) as i32);
        let scaled = self.reset_timeout.as_secs_f64() * factor;
        if !scaled.is_finite() || scaled >= self.max_cooldown.as_secs_f64() {
            return self.max_cooldown;
        }
        Duration::from_secs_f64(scaled)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold must be at least 1"));
        }
        if self.half_open_max_probes == 0 {
            return Err(ConfigError::invalid("half_open_max_probes must be at least 1"));
        }
        if self.reset_timeout.is_zero() {
            return Err(ConfigError::invalid("reset_timeout_ms must be positive"));
        }
        if !self.cooldown_multiplier.is_finite() || self.cooldown_multiplier < 1.0 {
            return Err(ConfigError::invalid("cooldown_multiplier must be >= 1.0"));
        }
        Ok(())
    }
}

/// Bounded exponential retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    #[serde(rename = "base_delay_ms", with = "millis")]
    pub base_delay: Duration,

    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts must be at least 1"));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::invalid("max_delay_ms must be >= base_delay_ms"));
        }
        Ok(())
    }
}

/// One sliding window: at most `max_requests` within `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub max_requests: u32,

    #[serde(rename = "window_ms", with = "millis")]
    pub window: Duration,
}

impl WindowConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Rate-limit windows per tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub global: WindowConfig,
    pub namespace_admin: WindowConfig,
    /// Tightest window; applies to most-privileged grants in production
    pub privileged: WindowConfig,
    /// Tracked (caller, tier) windows above which idle windows are purged
    pub max_tracked_windows: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global: WindowConfig::new(120, Duration::from_secs(60)),
            namespace_admin: WindowConfig::new(30, Duration::from_secs(60)),
            privileged: WindowConfig::new(3, Duration::from_secs(600)),
            max_tracked_windows: 10_000,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self, tier: RateTier) -> WindowConfig {
        match tier {
            RateTier::Global => self.global,
            RateTier::NamespaceAdmin => self.namespace_admin,
            RateTier::Privileged => self.privileged,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for tier in [RateTier::Global, RateTier::NamespaceAdmin, RateTier::Privileged] {
            if self.window(tier).window.is_zero() {
                return Err(ConfigError::invalid(format!(
                    "{} window_ms must be positive",
                    tier.as_str()
                )));
            }
        }
        Ok(())
    }
}
