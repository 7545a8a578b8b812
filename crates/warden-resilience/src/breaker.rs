//! Circuit breaker for external dependencies.
//!
//! Stops calling a dependency that keeps failing and probes it again after a
//! cooldown. Callers take a [`BreakerPermit`] before the call and settle it
//! with the outcome afterwards; the outcome is applied under the breaker lock
//! and discarded if the breaker changed state while the call was in flight.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::CircuitBreakerConfig;
use crate::error::{BreakerRejection, CallError, Retryable};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,

    /// Calls fail fast until the cooldown elapses.
    Open,

    /// A limited number of probes test whether the dependency recovered.
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding for gauges: closed 0, half-open 1, open 2.
    pub fn as_gauge(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::HalfOpen => 1,
            CircuitState::Open => 2,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    Neutral,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    opened_until: Option<Instant>,
    probes_in_flight: u32,
    /// Consecutive re-opens from half-open; scales the cooldown.
    reopens: u32,
    /// Bumped on every transition.
    generation: u64,
    last_transition: DateTime<Utc>,
}

/// Circuit breaker for one dependency key.
#[derive(Debug)]
pub struct CircuitBreaker {
    dependency: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(
        dependency: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            dependency: dependency.into(),
            config,
            clock,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_until: None,
                probes_in_flight: 0,
                reopens: 0,
                generation: 0,
                last_transition: Utc::now(),
            }),
        }
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, moving OPEN to HALF_OPEN if the cooldown has elapsed.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.check_cooldown(&mut inner, self.clock.now());
        inner.state
    }

    /// Ask for permission to call the dependency.
    pub fn try_acquire(&self) -> Result<BreakerPermit<'_>, BreakerRejection> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.check_cooldown(&mut inner, now);

        match inner.state {
            CircuitState::Closed => Ok(BreakerPermit::new(self, inner.generation, false)),
            CircuitState::Open => {
                let retry_after = inner
                    .opened_until
                    .map(|until| until.saturating_duration_since(now))
                    .unwrap_or(self.config.reset_timeout);
                Err(self.reject(CircuitState::Open, retry_after))
            }
            CircuitState::HalfOpen => {
                if inner.probes_in_flight < self.config.half_open_max_probes {
                    inner.probes_in_flight += 1;
                    debug!(
                        dependency = %self.dependency,
                        probes_in_flight = inner.probes_in_flight,
                        "Half-open probe admitted"
                    );
                    Ok(BreakerPermit::new(self, inner.generation, true))
                } else {
                    Err(self.reject(CircuitState::HalfOpen, self.config.reset_timeout))
                }
            }
        }
    }

    /// Run `call` through the breaker.
    ///
    /// Retryable failures count toward opening the circuit. Healthy
    /// responses count as success. Other non-retryable failures are passed
    /// through without touching breaker state.
    pub async fn execute<T, E, F, Fut>(&self, call: F) -> Result<T, CallError<E>>
    where
        E: Retryable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.try_acquire().map_err(CallError::Rejected)?;

        match call().await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(err) => {
                if err.is_retryable() {
                    permit.failure();
                } else if err.is_healthy_response() {
                    permit.success();
                } else {
                    permit.release();
                }
                Err(CallError::Failed(err))
            }
        }
    }

    /// Health snapshot for this dependency.
    pub fn health(&self) -> BreakerHealth {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.check_cooldown(&mut inner, now);

        let next_retry_at = match (inner.state, inner.opened_until) {
            (CircuitState::Open, Some(until)) => {
                let remaining = until.saturating_duration_since(now);
                chrono::Duration::from_std(remaining)
                    .ok()
                    .map(|delta| Utc::now() + delta)
            }
            _ => None,
        };

        BreakerHealth {
            dependency: self.dependency.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            next_retry_at,
            last_transition: inner.last_transition,
            generation: inner.generation,
        }
    }

    /// Force the circuit to a specific state.
    pub fn force_state(&self, new_state: CircuitState) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        info!(
            dependency = %self.dependency,
            old_state = %inner.state,
            new_state = %new_state,
            "Circuit breaker state forced"
        );
        let cooldown = self.config.cooldown_for(inner.reopens);
        self.transition_to(&mut inner, new_state, now, cooldown);
    }

    /// Reset the circuit breaker to closed state.
    pub fn reset(&self) {
        self.force_state(CircuitState::Closed);
    }

    fn reject(&self, state: CircuitState, retry_after: Duration) -> BreakerRejection {
        debug!(
            dependency = %self.dependency,
            state = %state,
            retry_after_ms = retry_after.as_millis() as u64,
            "Circuit breaker rejected call"
        );
        BreakerRejection {
            dependency: self.dependency.clone(),
            state,
            retry_after,
        }
    }

    fn check_cooldown(&self, inner: &mut BreakerInner, now: Instant) {
        if inner.state != CircuitState::Open {
            return;
        }
        let elapsed = inner.opened_until.map_or(true, |until| now >= until);
        if elapsed {
            info!(
                dependency = %self.dependency,
                "Circuit breaker transitioning to half-open after cooldown"
            );
            self.transition_to(inner, CircuitState::HalfOpen, now, Duration::ZERO);
        }
    }

    fn settle(&self, generation: u64, probe: bool, outcome: Outcome) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if inner.generation != generation {
            debug!(
                dependency = %self.dependency,
                permit_generation = generation,
                current_generation = inner.generation,
                "Discarding outcome from an earlier breaker generation"
            );
            return;
        }

        if probe {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }

        match (inner.state, outcome) {
            (_, Outcome::Neutral) | (CircuitState::Open, _) => {}
            (CircuitState::Closed, Outcome::Success) => {
                inner.failure_count = 0;
            }
            (CircuitState::HalfOpen, Outcome::Success) => {
                info!(
                    dependency = %self.dependency,
                    "Circuit breaker closing after successful probe"
                );
                self.transition_to(&mut inner, CircuitState::Closed, now, Duration::ZERO);
            }
            (CircuitState::Closed, Outcome::Failure) => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    let cooldown = self.config.cooldown_for(0);
                    warn!(
                        dependency = %self.dependency,
                        failures = inner.failure_count,
                        cooldown_ms = cooldown.as_millis() as u64,
                        "Circuit breaker opening due to failures"
                    );
                    self.transition_to(&mut inner, CircuitState::Open, now, cooldown);
                }
            }
            (CircuitState::HalfOpen, Outcome::Failure) => {
                inner.reopens += 1;
                let cooldown = self.config.cooldown_for(inner.reopens);
                warn!(
                    dependency = %self.dependency,
                    reopens = inner.reopens,
                    cooldown_ms = cooldown.as_millis() as u64,
                    "Circuit breaker re-opening after failed probe"
                );
                self.transition_to(&mut inner, CircuitState::Open, now, cooldown);
            }
        }
    }

    fn transition_to(
        &self,
        inner: &mut BreakerInner,
        new_state: CircuitState,
        now: Instant,
        cooldown: Duration,
    ) {
        inner.state = new_state;
        inner.generation += 1;
        inner.last_transition = Utc::now();
        inner.probes_in_flight = 0;

        match new_state {
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.reopens = 0;
                inner.opened_until = None;
            }
            CircuitState::Open => {
                inner.opened_until = Some(now + cooldown);
            }
            CircuitState::HalfOpen => {
                inner.opened_until = None;
            }
        }
    }
}

/// Admission ticket for one call through a breaker.
///
/// Settle it with [`success`](Self::success), [`failure`](Self::failure), or
/// [`release`](Self::release). Dropping an unsettled permit releases it.
#[derive(Debug)]
#[must_use = "a permit must be settled with the call outcome"]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    probe: bool,
    settled: bool,
}

impl<'a> BreakerPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, generation: u64, probe: bool) -> Self {
        Self {
            breaker,
            generation,
            probe,
            settled: false,
        }
    }

    /// Whether this permit is a half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn success(mut self) {
        self.settle(Outcome::Success);
    }

    /// Report a retryable failure.
    pub fn failure(mut self) {
        self.settle(Outcome::Failure);
    }

    /// Give the permit back without affecting breaker state.
    pub fn release(mut self) {
        self.settle(Outcome::Neutral);
    }

    fn settle(&mut self, outcome: Outcome) {
        if !self.settled {
            self.settled = true;
            self.breaker.settle(self.generation, self.probe, outcome);
        }
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        self.settle(Outcome::Neutral);
    }
}

/// Health snapshot of one breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerHealth {
    pub dependency: String,
    pub state: CircuitState,
    pub failure_count: u32,
    /// When the next probe will be admitted, if currently open.
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_transition: DateTime<Utc>,
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[derive(Debug)]
    enum DepError {
        Timeout,
        NotFound,
        Exists,
    }

    impl Retryable for DepError {
        fn is_retryable(&self) -> bool {
            matches!(self, DepError::Timeout)
        }

        fn is_healthy_response(&self) -> bool {
            matches!(self, DepError::Exists)
        }
    }

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(10),
            half_open_max_probes: 1,
            cooldown_multiplier: 2.0,
            max_cooldown: Duration::from_secs(60),
        }
    }

    fn breaker() -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (
            CircuitBreaker::new("control-plane", test_config(), clock.clone()),
            clock,
        )
    }

    async fn fail(breaker: &CircuitBreaker, err: DepError) {
        let _ = breaker.execute(|| async { Err::<(), _>(err) }).await;
    }

    #[tokio::test]
    async fn test_opens_after_threshold() {
        let (breaker, _clock) = breaker();

        fail(&breaker, DepError::Timeout).await;
        fail(&breaker, DepError::Timeout).await;
        assert_eq!(breaker.state(), CircuitState::Closed);

        fail(&breaker, DepError::Timeout).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let err = breaker
            .execute(|| async { Ok::<_, DepError>(()) })
            .await
            .unwrap_err();
        match err {
            CallError::Rejected(rejection) => {
                assert_eq!(rejection.state, CircuitState::Open);
                assert_eq!(rejection.retry_after, Duration::from_secs(10));
            }
            CallError::Failed(_) => panic!("call should not have run"),
        }
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let (breaker, _clock) = breaker();

        fail(&breaker, DepError::Timeout).await;
        fail(&breaker, DepError::Timeout).await;
        breaker
            .execute(|| async { Ok::<_, DepError>(()) })
            .await
            .unwrap();
        fail(&breaker, DepError::Timeout).await;
        fail(&breaker, DepError::Timeout).await;

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.health().failure_count, 2);
    }

    #[tokio::test]
    async fn test_healthy_response_resets_and_closes() {
        let (breaker, clock) = breaker();

        fail(&breaker, DepError::Timeout).await;
        fail(&breaker, DepError::Timeout).await;
        fail(&breaker, DepError::Exists).await;
        assert_eq!(breaker.health().failure_count, 0);

        breaker.force_state(CircuitState::Open);
        clock.advance(Duration::from_secs(10));
        fail(&breaker, DepError::Exists).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_non_retryable_failures_never_trip() {
        let (breaker, _clock) = breaker();

        for _ in 0..10 {
            fail(&breaker, DepError::NotFound).await;
        }

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.health().failure_count, 0);
    }

    #[tokio::test]
    async fn test_half_open_probe_closes_circuit() {
        let (breaker, clock) = breaker();
        for _ in 0..3 {
            fail(&breaker, DepError::Timeout).await;
        }

        clock.advance(Duration::from_secs(10));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker
            .execute(|| async { Ok::<_, DepError>(()) })
            .await
            .unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_failed_probe_reopens_with_longer_cooldown() {
        let (breaker, clock) = breaker();
        for _ in 0..3 {
            fail(&breaker, DepError::Timeout).await;
        }

        clock.advance(Duration::from_secs(10));
        fail(&breaker, DepError::Timeout).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        // Second cooldown is doubled.
        clock.advance(Duration::from_secs(10));
        assert_eq!(breaker.state(), CircuitState::Open);
        clock.advance(Duration::from_secs(10));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_admits_bounded_probes() {
        let (breaker, clock) = breaker();
        breaker.force_state(CircuitState::Open);
        clock.advance(Duration::from_secs(10));

        let probe = breaker.try_acquire().unwrap();
        assert!(probe.is_probe());
        assert!(breaker.try_acquire().is_err());

        probe.release();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn test_non_retryable_probe_releases_slot() {
        let (breaker, clock) = breaker();
        breaker.force_state(CircuitState::Open);
        clock.advance(Duration::from_secs(10));

        let probe = breaker.try_acquire().unwrap();
        probe.release();

        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        let again = breaker.try_acquire().unwrap();
        again.success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_stale_outcome_is_discarded() {
        let (breaker, _clock) = breaker();

        let stale = breaker.try_acquire().unwrap();
        breaker.force_state(CircuitState::Open);
        breaker.reset();

        // Issued before two transitions; must not count.
        stale.failure();
        assert_eq!(breaker.health().failure_count, 0);
    }

    #[test]
    fn test_dropped_permit_is_released() {
        let (breaker, clock) = breaker();
        breaker.force_state(CircuitState::Open);
        clock.advance(Duration::from_secs(10));

        {
            let _probe = breaker.try_acquire().unwrap();
        }
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn test_health_reports_next_retry() {
        let (breaker, _clock) = breaker();
        breaker.force_state(CircuitState::Open);

        let health = breaker.health();
        assert_eq!(health.dependency, "control-plane");
        assert_eq!(health.state, CircuitState::Open);
        assert!(health.next_retry_at.is_some());
    }
}
