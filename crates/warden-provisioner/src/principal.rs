//! Principal validation against the identity directory
//!
//! A principal id is checked syntactically first; only canonical object ids
//! reach the directory. Each lookup takes one permit from the
//! `identity-directory` breaker and retries transient failures inside that
//! permit, so the breaker sees one outcome per lookup rather than one per
//! attempt.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use warden_observability::WardenMetrics;
use warden_resilience::{retry_with_backoff, CircuitBreaker, Clock, RetryPolicy, Retryable, Sleeper};
use warden_types::{PrincipalId, PrincipalType, PrincipalValidationResult, WardenError};

use crate::error::DirectoryError;

/// Breaker key for the identity directory
pub const DIRECTORY_DEPENDENCY: &str = "identity-directory";

/// Principal cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrincipalCacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for PrincipalCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
        }
    }
}

/// A directory object as returned by a lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub object_id: String,
    pub principal_type: PrincipalType,
    pub display_name: String,
}

/// Identity directory client
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Look up `id` as a principal of type `kind`.
    async fn lookup(
        &self,
        id: &PrincipalId,
        kind: PrincipalType,
    ) -> Result<DirectoryEntry, DirectoryError>;
}

/// Directory backed by a map, for development and tests
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    entries: RwLock<HashMap<(String, PrincipalType), DirectoryEntry>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, id: &str, display_name: &str) -> Self {
        self.insert(id, PrincipalType::User, display_name);
        self
    }

    pub fn with_group(self, id: &str, display_name: &str) -> Self {
        self.insert(id, PrincipalType::Group, display_name);
        self
    }

    pub fn insert(&self, id: &str, principal_type: PrincipalType, display_name: &str) {
        let object_id = id.to_ascii_lowercase();
        self.entries.write().insert(
            (object_id.clone(), principal_type),
            DirectoryEntry {
                object_id,
                principal_type,
                display_name: display_name.to_string(),
            },
        );
    }

    pub fn remove(&self, id: &str, principal_type: PrincipalType) {
        self.entries
            .write()
            .remove(&(id.to_ascii_lowercase(), principal_type));
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn lookup(
        &self,
        id: &PrincipalId,
        kind: PrincipalType,
    ) -> Result<DirectoryEntry, DirectoryError> {
        self.entries
            .read()
            .get(&(id.as_str().to_string(), kind))
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound {
                principal_id: id.to_string(),
            })
    }
}

#[derive(Debug, Clone)]
struct CachedPrincipal {
    result: PrincipalValidationResult,
    cached_at: Instant,
}

/// Validates principals through the guarded directory
pub struct PrincipalValidator {
    directory: Arc<dyn IdentityDirectory>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    timeout: Duration,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn Clock>,
    cache: Option<DashMap<PrincipalId, CachedPrincipal>>,
    cache_ttl: Duration,
    metrics: Option<Arc<WardenMetrics>>,
}

impl std::fmt::Debug for PrincipalValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalValidator")
            .field("breaker", &self.breaker.dependency())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("cache_enabled", &self.cache.is_some())
            .finish()
    }
}

impl PrincipalValidator {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        timeout: Duration,
        sleeper: Arc<dyn Sleeper>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            breaker,
            retry,
            timeout,
            sleeper,
            clock,
            cache: None,
            cache_ttl: Duration::ZERO,
            metrics: None,
        }
    }

    /// Cache successful validations according to `config`.
    pub fn with_cache(mut self, config: &PrincipalCacheConfig) -> Self {
        if config.enabled && config.ttl_secs > 0 {
            self.cache = Some(DashMap::new());
            self.cache_ttl = Duration::from_secs(config.ttl_secs);
        } else {
            self.cache = None;
        }
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<WardenMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Number of cached principals, expired or not.
    pub fn cached_len(&self) -> usize {
        self.cache.as_ref().map_or(0, DashMap::len)
    }

    /// Drop a principal from the cache.
    pub fn invalidate(&self, id: &PrincipalId) {
        if let Some(cache) = &self.cache {
            if cache.remove(id).is_some() {
                debug!(principal = %id, "Principal cache entry invalidated");
            }
        }
    }

    /// Validate `raw_id`, looking it up as `hint` or as User then Group.
    pub async fn validate(
        &self,
        raw_id: &str,
        hint: Option<PrincipalType>,
    ) -> Result<PrincipalValidationResult, WardenError> {
        let id = PrincipalId::parse(raw_id)?;

        if let Some(hit) = self.cached(&id, hint) {
            debug!(principal = %id, "Principal cache hit");
            return Ok(hit);
        }

        let result = self.lookup_any(&id, hint).await;
        match &result {
            Ok(validated) => {
                if let Some(cache) = &self.cache {
                    cache.insert(
                        id.clone(),
                        CachedPrincipal {
                            result: validated.clone(),
                            cached_at: self.clock.now(),
                        },
                    );
                }
            }
            Err(_) => self.invalidate(&id),
        }
        result
    }

    fn cached(&self, id: &PrincipalId, hint: Option<PrincipalType>) -> Option<PrincipalValidationResult> {
        let cache = self.cache.as_ref()?;
        let entry = cache.get(id)?;

        let fresh = self.clock.now().saturating_duration_since(entry.cached_at) < self.cache_ttl;
        let kind_matches = hint.map_or(true, |kind| kind == entry.result.principal_type);
        if fresh && kind_matches {
            return Some(entry.result.clone());
        }

        drop(entry);
        if !fresh {
            cache.remove(id);
        }
        None
    }

    async fn lookup_any(
        &self,
        id: &PrincipalId,
        hint: Option<PrincipalType>,
    ) -> Result<PrincipalValidationResult, WardenError> {
        let kinds: Vec<PrincipalType> = match hint {
            Some(kind) => vec![kind],
            None => PrincipalType::LOOKUP_ORDER.to_vec(),
        };

        let mut notes = Vec::new();
        for kind in kinds {
            match self.lookup_guarded(id, kind).await? {
                Some(entry) => {
                    info!(
                        principal = %id,
                        principal_type = %entry.principal_type,
                        "Principal validated"
                    );
                    let mut result = PrincipalValidationResult::verified(
                        id.clone(),
                        entry.principal_type,
                        entry.display_name,
                    );
                    for note in notes {
                        result = result.with_note(note);
                    }
                    return Ok(result);
                }
                None => notes.push(format!("not found as {}", kind)),
            }
        }

        Err(WardenError::PrincipalNotFound {
            principal_id: id.to_string(),
        })
    }

    /// One breaker-guarded lookup. `Ok(None)` means not found.
    async fn lookup_guarded(
        &self,
        id: &PrincipalId,
        kind: PrincipalType,
    ) -> Result<Option<DirectoryEntry>, WardenError> {
        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(rejection) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_breaker_rejection(DIRECTORY_DEPENDENCY);
                }
                return Err(WardenError::unavailable(
                    DIRECTORY_DEPENDENCY,
                    rejection.to_string(),
                    rejection.retry_after,
                ));
            }
        };

        let timeout = self.timeout;
        let outcome = retry_with_backoff(&self.retry, self.sleeper.as_ref(), |attempt| {
            let directory = self.directory.clone();
            async move {
                debug!(principal = %id, principal_type = %kind, attempt, "Directory lookup");
                match tokio::time::timeout(timeout, directory.lookup(id, kind)).await {
                    Ok(result) => result,
                    Err(_) => Err(DirectoryError::Timeout(timeout)),
                }
            }
        })
        .await;

        let result = match outcome {
            Ok(entry) => {
                permit.success();
                Ok(Some(entry))
            }
            Err(DirectoryError::NotFound { .. }) => {
                permit.release();
                Ok(None)
            }
            Err(err) if err.is_retryable() => {
                permit.failure();
                warn!(principal = %id, error = %err, "Directory lookup failed after retries");
                Err(WardenError::unavailable(
                    DIRECTORY_DEPENDENCY,
                    err.to_string(),
                    self.retry_hint(&err),
                ))
            }
            Err(err) => {
                permit.release();
                warn!(principal = %id, error = %err, "Directory rejected lookup");
                Err(WardenError::validation(format!(
                    "principal {} could not be looked up",
                    id
                )))
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.set_breaker_state(DIRECTORY_DEPENDENCY, self.breaker.state().as_gauge());
        }
        result
    }

    fn retry_hint(&self, err: &DirectoryError) -> Duration {
        match err {
            DirectoryError::Throttled {
                retry_after: Some(after),
            } => *after,
            _ => self.retry.max_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_resilience::{CircuitBreakerConfig, ManualClock, ManualSleeper};

    const ALICE: &str = "6f1c2a9e-0b44-4e8a-9c1d-2b7e5f3a8d10";
    const FRONTEND: &str = "0a4b7c1d-2e3f-4a5b-8c6d-7e8f9a0b1c2d";

    fn validator(directory: Arc<InMemoryDirectory>) -> (PrincipalValidator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let breaker = Arc::new(CircuitBreaker::new(
            DIRECTORY_DEPENDENCY,
            CircuitBreakerConfig::default(),
            clock.clone(),
        ));
        let validator = PrincipalValidator::new(
            directory,
            breaker,
            RetryPolicy::default(),
            Duration::from_secs(2),
            Arc::new(ManualSleeper::new()),
            clock.clone(),
        )
        .with_cache(&PrincipalCacheConfig::default());
        (validator, clock)
    }

    fn directory() -> Arc<InMemoryDirectory> {
        Arc::new(
            InMemoryDirectory::new()
                .with_user(ALICE, "Alice")
                .with_group(FRONTEND, "Frontend Engineers"),
        )
    }

    #[tokio::test]
    async fn test_unhinted_falls_back_to_group() {
        let (validator, _) = validator(directory());
        let result = validator.validate(FRONTEND, None).await.unwrap();

        assert_eq!(result.principal_type, PrincipalType::Group);
        assert_eq!(result.display_name, "Frontend Engineers");
        assert_eq!(result.errors, vec!["not found as User".to_string()]);
    }

    #[tokio::test]
    async fn test_hint_restricts_lookup() {
        let (validator, _) = validator(directory());
        let err = validator
            .validate(ALICE, Some(PrincipalType::Group))
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::PrincipalNotFound { .. }));
    }

    #[tokio::test]
    async fn test_malformed_id_never_reaches_directory() {
        let (validator, _) = validator(directory());
        let err = validator.validate("alice@contoso.com", None).await.unwrap_err();
        assert!(matches!(err, WardenError::Validation { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_cache_expires_after_ttl() {
        let directory = directory();
        let (validator, clock) = validator(directory.clone());

        validator.validate(ALICE, None).await.unwrap();
        assert_eq!(validator.cached_len(), 1);

        directory.remove(ALICE, PrincipalType::User);
        // Still served from cache.
        validator.validate(ALICE, None).await.unwrap();

        clock.advance(Duration::from_secs(301));
        let err = validator.validate(ALICE, None).await.unwrap_err();
        assert!(matches!(err, WardenError::PrincipalNotFound { .. }));
        assert_eq!(validator.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_cached_entry_respects_hint() {
        let (validator, _) = validator(directory());
        validator.validate(ALICE, None).await.unwrap();

        let err = validator
            .validate(ALICE, Some(PrincipalType::Group))
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::PrincipalNotFound { .. }));
        assert_eq!(validator.cached_len(), 0);
    }
}
