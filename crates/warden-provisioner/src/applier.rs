//! Idempotent apply, status, and removal against the control-plane
//!
//! Every control-plane call goes through the `control-plane` breaker with the
//! configured timeout. The applier never retries on its own; a failed apply
//! is reported to the caller as retryable.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use warden_observability::WardenMetrics;
use warden_resilience::{CallError, CircuitBreaker, CircuitState};
use warden_types::{AssignmentStatus, WardenError};

use crate::control_plane::{ControlPlane, StoredResource};
use crate::error::ControlPlaneError;
use crate::manifest::{LabelSelector, ManagedResource};

/// Breaker key for the declarative control-plane
pub const CONTROL_PLANE_DEPENDENCY: &str = "control-plane";

/// What an apply did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The resource did not exist and was created
    Created,
    /// An identical resource was already present
    Unchanged,
    /// Desired state matched but labels had drifted and were rewritten
    Updated,
}

impl ApplyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Unchanged => "unchanged",
            Self::Updated => "updated",
        }
    }
}

/// Applies managed resources through the guarded control-plane
pub struct DeclarativeApplier {
    control_plane: Arc<dyn ControlPlane>,
    breaker: Arc<CircuitBreaker>,
    timeout: Duration,
    namespace: String,
    metrics: Option<Arc<WardenMetrics>>,
}

impl std::fmt::Debug for DeclarativeApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeclarativeApplier")
            .field("breaker", &self.breaker.dependency())
            .field("timeout", &self.timeout)
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl DeclarativeApplier {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        breaker: Arc<CircuitBreaker>,
        timeout: Duration,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            control_plane,
            breaker,
            timeout,
            namespace: namespace.into(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<WardenMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Create-or-update `resource`.
    ///
    /// An existing resource with the same spec is left alone, or has its
    /// labels rewritten if they drifted. A different spec under the same
    /// name is a conflict.
    pub async fn apply(&self, resource: &ManagedResource) -> Result<ApplyOutcome, WardenError> {
        let name = resource.name().to_string();
        let cp = self.control_plane.clone();
        let desired = resource.clone();

        match self.guarded(|| async move { cp.create(desired).await }).await {
            Ok(_) => {
                info!(name = %name, "Role assignment created");
                Ok(ApplyOutcome::Created)
            }
            Err(CallError::Failed(ControlPlaneError::AlreadyExists(existing))) => {
                self.reconcile_existing(resource, *existing).await
            }
            Err(err) => Err(self.map_error(err, &name)),
        }
    }

    async fn reconcile_existing(
        &self,
        desired: &ManagedResource,
        existing: StoredResource,
    ) -> Result<ApplyOutcome, WardenError> {
        let name = desired.name().to_string();

        if !existing.resource.spec_matches(desired) {
            warn!(name = %name, "Existing assignment diverges from the requested grant");
            return Err(WardenError::Conflict { name });
        }

        if existing.resource.labels() == desired.labels() {
            debug!(name = %name, "Role assignment already up to date");
            return Ok(ApplyOutcome::Unchanged);
        }

        let cp = self.control_plane.clone();
        let resource = desired.clone();
        self.guarded(|| async move { cp.update(resource).await })
            .await
            .map_err(|err| self.map_error(err, &name))?;
        info!(name = %name, "Role assignment metadata updated");
        Ok(ApplyOutcome::Updated)
    }

    /// Managed assignments for `namespace`, optionally narrowed to a cluster.
    pub async fn status(
        &self,
        namespace: &str,
        cluster: Option<&str>,
    ) -> Result<Vec<AssignmentStatus>, WardenError> {
        let selector = Self::selector(namespace, cluster);
        let cp = self.control_plane.clone();
        let resource_namespace = self.namespace.clone();

        let stored = self
            .guarded(|| async move { cp.list(&resource_namespace, &selector).await })
            .await
            .map_err(|err| self.map_error(err, namespace))?;

        let mut statuses: Vec<AssignmentStatus> = stored.iter().map(project).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(statuses)
    }

    /// Delete every managed assignment for `namespace`. Removing nothing is
    /// not an error.
    pub async fn remove(&self, namespace: &str, cluster: Option<&str>) -> Result<usize, WardenError> {
        let selector = Self::selector(namespace, cluster);
        let cp = self.control_plane.clone();
        let resource_namespace = self.namespace.clone();

        let removed = self
            .guarded(|| async move { cp.delete_by_selector(&resource_namespace, &selector).await })
            .await
            .map_err(|err| self.map_error(err, namespace))?;
        info!(namespace = %namespace, removed, "Managed assignments removed");
        Ok(removed)
    }

    fn selector(namespace: &str, cluster: Option<&str>) -> LabelSelector {
        let selector = LabelSelector::for_namespace(namespace);
        match cluster {
            Some(cluster) => selector.with_cluster(cluster),
            None => selector,
        }
    }

    async fn guarded<T, F, Fut>(&self, call: F) -> Result<T, CallError<ControlPlaneError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ControlPlaneError>>,
    {
        let timeout = self.timeout;
        let result = self
            .breaker
            .execute(|| async move {
                match tokio::time::timeout(timeout, call()).await {
                    Ok(result) => result,
                    Err(_) => Err(ControlPlaneError::Timeout(timeout)),
                }
            })
            .await;

        if let Some(metrics) = &self.metrics {
            if result.as_ref().err().is_some_and(CallError::is_rejected) {
                metrics.record_breaker_rejection(CONTROL_PLANE_DEPENDENCY);
            }
            metrics.set_breaker_state(CONTROL_PLANE_DEPENDENCY, self.breaker.state().as_gauge());
        }
        result
    }

    fn map_error(&self, err: CallError<ControlPlaneError>, subject: &str) -> WardenError {
        match err {
            CallError::Rejected(rejection) => WardenError::unavailable(
                CONTROL_PLANE_DEPENDENCY,
                rejection.to_string(),
                rejection.retry_after,
            ),
            CallError::Failed(ControlPlaneError::Invalid(reason)) => {
                warn!(subject = %subject, reason = %reason, "Control-plane rejected the resource");
                WardenError::validation(format!("{} was rejected by the control-plane", subject))
            }
            CallError::Failed(ControlPlaneError::AlreadyExists(_)) => WardenError::Conflict {
                name: subject.to_string(),
            },
            CallError::Failed(other) => {
                warn!(subject = %subject, error = %other, "Control-plane call failed");
                let retry_after = match self.breaker.state() {
                    CircuitState::Closed => Duration::ZERO,
                    _ => self.breaker.config().reset_timeout,
                };
                WardenError::unavailable(CONTROL_PLANE_DEPENDENCY, other.to_string(), retry_after)
            }
        }
    }
}

/// Caller-facing projection of a stored assignment.
pub fn project(stored: &StoredResource) -> AssignmentStatus {
    let spec = stored.resource.role_assignment();
    AssignmentStatus {
        name: spec.name.clone(),
        principal_id: spec.principal_id.clone(),
        role_definition_id: spec.role_definition_id.clone(),
        scope: spec.scope.clone(),
        phase: stored.phase(),
        created_at: stored.created_at,
    }
}
