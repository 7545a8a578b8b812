//! Registry of circuit breakers keyed by dependency.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::breaker::{BreakerHealth, CircuitBreaker};
use crate::clock::Clock;
use crate::config::CircuitBreakerConfig;

/// Owns one [`CircuitBreaker`] per dependency key.
///
/// Breakers are created lazily on first use. Per-key configuration
/// overrides the default.
#[derive(Debug)]
pub struct BreakerRegistry {
    default_config: CircuitBreakerConfig,
    overrides: HashMap<String, CircuitBreakerConfig>,
    clock: Arc<dyn Clock>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            default_config,
            overrides: HashMap::new(),
            clock,
            breakers: DashMap::new(),
        }
    }

    /// Use `config` for the breaker named `dependency`.
    pub fn with_override(mut self, dependency: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.overrides.insert(dependency.into(), config);
        self
    }

    /// Breaker for `dependency`, created on first use.
    pub fn breaker(&self, dependency: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(dependency) {
            return existing.clone();
        }

        self.breakers
            .entry(dependency.to_string())
            .or_insert_with(|| {
                let config = self
                    .overrides
                    .get(dependency)
                    .cloned()
                    .unwrap_or_else(|| self.default_config.clone());
                Arc::new(CircuitBreaker::new(dependency, config, self.clock.clone()))
            })
            .clone()
    }

    /// Breaker for `dependency` if one has been created.
    pub fn get(&self, dependency: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(dependency).map(|entry| entry.clone())
    }

    /// Health of every breaker, sorted by dependency key.
    pub fn health(&self) -> Vec<BreakerHealth> {
        let mut health: Vec<BreakerHealth> = self
            .breakers
            .iter()
            .map(|entry| entry.value().health())
            .collect();
        health.sort_by(|a, b| a.dependency.cmp(&b.dependency));
        health
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn registry() -> BreakerRegistry {
        BreakerRegistry::new(CircuitBreakerConfig::default(), Arc::new(ManualClock::new()))
            .with_override(
                "control-plane",
                CircuitBreakerConfig {
                    failure_threshold: 2,
                    reset_timeout: Duration::from_secs(5),
                    ..Default::default()
                },
            )
    }

    #[test]
    fn test_same_key_returns_same_breaker() {
        let registry = registry();
        let a = registry.breaker("identity-directory");
        let b = registry.breaker("identity-directory");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_override_applies_per_key() {
        let registry = registry();
        assert_eq!(registry.breaker("control-plane").config().failure_threshold, 2);
        assert_eq!(
            registry.breaker("identity-directory").config().failure_threshold,
            CircuitBreakerConfig::default().failure_threshold
        );
    }

    #[test]
    fn test_breakers_are_isolated() {
        let registry = registry();
        registry.breaker("control-plane").force_state(CircuitState::Open);

        assert_eq!(registry.breaker("identity-directory").state(), CircuitState::Closed);

        let health = registry.health();
        assert_eq!(health.len(), 2);
        assert_eq!(health[0].dependency, "control-plane");
        assert_eq!(health[0].state, CircuitState::Open);
    }

    #[test]
    fn test_get_does_not_create() {
        let registry = registry();
        assert!(registry.get("control-plane").is_none());
        assert!(registry.is_empty());
    }
}
