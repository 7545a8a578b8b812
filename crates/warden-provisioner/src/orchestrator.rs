//! Provisioning orchestrator
//!
//! The [`Provisioner`] is the single entry point for grant provisioning. It
//! drives each request through rate limiting, the approval gate, principal
//! validation, scoping, and apply, recording the lifecycle, a metric, and an
//! audit event for every attempt.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};
use warden_observability::{
    AuditAction, AuditActor, AuditEmitter, AuditEvent, AuditOutcome, AuditResource, ResourceKind,
    WardenMetrics,
};
use warden_policy::{ApprovalGate, ApprovalSignal, GrantPolicyContext, PolicyDecision};
use warden_registry::{ClusterRegistry, InMemoryClusterRegistry};
use warden_resilience::{
    BreakerHealth, BreakerRegistry, CircuitBreakerConfig, Clock, OperationClass,
    RateLimitRejection, RateLimiter, Sleeper, SystemClock, TokioSleeper,
};
use warden_types::{
    CallerIdentity, ClusterConfiguration, ClusterList, CorrelationId, Environment, FailureReport,
    NamespaceName, ProvisionRequest, ProvisioningResult, ProvisioningState, ProvisioningStatus,
    ProvisioningStep, RemoveAck, RemoveRequest, RoleTier, StatusReport, StatusRequest, TeamName,
    WardenError,
};

use crate::applier::{ApplyOutcome, DeclarativeApplier, CONTROL_PLANE_DEPENDENCY};
use crate::config::WardenConfig;
use crate::control_plane::ControlPlane;
use crate::error::ConfigError;
use crate::lifecycle::LifecycleTracker;
use crate::manifest::{GrantInput, GrantManifest, GrantManifestBuilder};
use crate::principal::{IdentityDirectory, PrincipalValidator, DIRECTORY_DEPENDENCY};
use crate::roles::RoleDefinition;

/// Per-request inputs that are not part of the request body
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Propagated correlation id; one is generated when absent
    pub correlation_id: Option<String>,

    /// Approval attached to the request, if any
    pub approval: Option<ApprovalSignal>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_approval(mut self, approval: ApprovalSignal) -> Self {
        self.approval = Some(approval);
        self
    }

    fn correlation(&self) -> CorrelationId {
        CorrelationId::propagate_or_generate(self.correlation_id.as_deref())
    }
}

/// Rate-limit class of a grant.
///
/// The most-privileged role in production is `privileged`, the same role
/// elsewhere is `namespace-admin`, everything else is `standard`.
pub fn classify(tier: RoleTier, environment: Environment) -> OperationClass {
    match tier {
        RoleTier::Admin if environment.is_production() => OperationClass::Privileged,
        RoleTier::Admin => OperationClass::NamespaceAdmin,
        RoleTier::Reader | RoleTier::Writer => OperationClass::Standard,
    }
}

/// A failed step and the error that stopped it
#[derive(Debug)]
struct Failed {
    step: ProvisioningStep,
    error: WardenError,
}

impl Failed {
    fn new(step: ProvisioningStep, error: impl Into<WardenError>) -> Self {
        Self {
            step,
            error: error.into(),
        }
    }

    fn report(&self, correlation_id: &CorrelationId) -> FailureReport {
        self.error.to_report(self.step, correlation_id)
    }

    fn audit_outcome(&self) -> AuditOutcome {
        match &self.error {
            WardenError::PolicyDenied { policy_id, reason } => AuditOutcome::Denied {
                policy_id: policy_id.clone(),
                reason: reason.clone(),
            },
            other => AuditOutcome::Failure {
                code: other.code().as_str().to_string(),
                message: other.caller_message(),
            },
        }
    }
}

enum Submitted {
    Created {
        manifest: GrantManifest,
        outcome: ApplyOutcome,
    },
    Pending {
        reason: String,
    },
}

/// Mutable bookkeeping for one submit
struct Attempt {
    lifecycle: LifecycleTracker,
    privileged: bool,
    cluster: Option<String>,
}

impl Attempt {
    fn new() -> Self {
        Self {
            lifecycle: LifecycleTracker::new(),
            privileged: false,
            cluster: None,
        }
    }

    fn advance(&mut self, next: ProvisioningState, step: ProvisioningStep) -> Result<(), Failed> {
        self.lifecycle
            .advance(next)
            .map_err(|err| Failed::new(step, err))
    }

    /// Move to `terminal` and wrap `error`.
    fn fail(
        &mut self,
        step: ProvisioningStep,
        terminal: ProvisioningState,
        error: impl Into<WardenError>,
    ) -> Failed {
        if let Err(err) = self.lifecycle.advance(terminal) {
            warn!(error = %err, "Could not record terminal lifecycle state");
        }
        Failed::new(step, error)
    }
}

struct ParsedGrant {
    namespace: NamespaceName,
    team: TeamName,
    environment: Environment,
    role: RoleDefinition,
}

/// Namespace access-grant provisioning core
pub struct Provisioner {
    registry: Arc<dyn ClusterRegistry>,
    builder: GrantManifestBuilder,
    limiter: RateLimiter,
    gate: ApprovalGate,
    validator: PrincipalValidator,
    applier: DeclarativeApplier,
    breakers: Arc<BreakerRegistry>,
    audit: Arc<AuditEmitter>,
    metrics: Option<Arc<WardenMetrics>>,
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("validator", &self.validator)
            .field("applier", &self.applier)
            .field("breakers", &self.breakers)
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    pub fn builder(config: WardenConfig) -> ProvisionerBuilder {
        ProvisionerBuilder::new(config)
    }

    pub fn registry(&self) -> &Arc<dyn ClusterRegistry> {
        &self.registry
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn audit(&self) -> &Arc<AuditEmitter> {
        &self.audit
    }

    pub fn validator(&self) -> &PrincipalValidator {
        &self.validator
    }

    // ========== Grant Operations ==========

    /// Provision a namespace access grant.
    ///
    /// Never fails outright: failures come back as a `failed` result
    /// carrying a sanitized report.
    #[instrument(
        skip(self, caller, request, ctx),
        fields(caller = %caller.id, namespace = %request.namespace, role = %request.role_key)
    )]
    pub async fn submit(
        &self,
        caller: &CallerIdentity,
        request: ProvisionRequest,
        ctx: RequestContext,
    ) -> ProvisioningResult {
        let started = Instant::now();
        let correlation_id = ctx.correlation();
        let mut attempt = Attempt::new();

        let outcome = self
            .run_submit(caller, &request, &ctx, &correlation_id, &mut attempt)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut resource = AuditResource::namespace(request.namespace.as_str())
            .with_attribute("team", request.team.as_str())
            .with_attribute("environment", request.environment.as_str())
            .with_attribute("role", request.role_key.as_str());
        if let Some(cluster) = &attempt.cluster {
            resource = resource.with_attribute("cluster", cluster.as_str());
        }
        let event = AuditEvent::builder(AuditAction::GrantProvisioned, correlation_id.clone())
            .actor(AuditActor::caller(caller))
            .resource(resource)
            .principal(&request.principal_id)
            .privileged(attempt.privileged)
            .state(attempt.lifecycle.current())
            .duration_ms(duration_ms);

        let state = attempt.lifecycle.current();
        let trace = attempt.lifecycle.into_trace();

        let result = match outcome {
            Ok(Submitted::Created { manifest, outcome }) => {
                info!(
                    correlation_id = %correlation_id,
                    cluster = %manifest.grant.cluster_name,
                    outcome = outcome.as_str(),
                    duration_ms,
                    "Access grant applied"
                );
                self.audit
                    .emit(event.outcome(AuditOutcome::Success).build());
                ProvisioningResult {
                    correlation_id,
                    status: ProvisioningStatus::Created,
                    assignment_ids: manifest.grant.assignment_ids(),
                    message: format!("role assignment {}", outcome.as_str()),
                    duration_ms,
                    state,
                    trace,
                    grant: Some(manifest.grant),
                    failure: None,
                }
            }
            Ok(Submitted::Pending { reason }) => {
                info!(correlation_id = %correlation_id, reason = %reason, "Access grant awaiting approval");
                self.audit.emit(
                    event
                        .outcome(AuditOutcome::Pending {
                            reason: reason.clone(),
                        })
                        .build(),
                );
                ProvisioningResult {
                    correlation_id,
                    status: ProvisioningStatus::PendingApproval,
                    assignment_ids: Vec::new(),
                    message: reason,
                    duration_ms,
                    state,
                    trace,
                    grant: None,
                    failure: None,
                }
            }
            Err(failed) => {
                warn!(
                    correlation_id = %correlation_id,
                    step = %failed.step,
                    code = %failed.error.code(),
                    error = %failed.error,
                    "Access grant failed"
                );
                self.audit.emit(
                    event
                        .outcome(failed.audit_outcome())
                        .step(failed.step)
                        .build(),
                );
                let report = failed.report(&correlation_id);
                ProvisioningResult {
                    correlation_id,
                    status: ProvisioningStatus::Failed,
                    assignment_ids: Vec::new(),
                    message: report.message.clone(),
                    duration_ms,
                    state,
                    trace,
                    grant: None,
                    failure: Some(report),
                }
            }
        };

        self.record_request("submit", result.status.as_str(), started);
        result
    }

    async fn run_submit(
        &self,
        caller: &CallerIdentity,
        request: &ProvisionRequest,
        ctx: &RequestContext,
        correlation_id: &CorrelationId,
        attempt: &mut Attempt,
    ) -> Result<Submitted, Failed> {
        use ProvisioningState as State;
        use ProvisioningStep as Step;

        let parsed = match self.parse_grant(request) {
            Ok(parsed) => parsed,
            Err(err) => {
                // Malformed requests still count against the caller's global window.
                if let Err(rejection) = self.limiter.check(&caller.id, OperationClass::Standard) {
                    let limited = self.rate_limited(rejection);
                    return Err(attempt.fail(Step::RateLimit, State::RateLimited, limited));
                }
                return Err(attempt.fail(Step::Intake, State::ValidationFailed, err));
            }
        };
        attempt.privileged = parsed.role.tier.is_most_privileged();

        let class = classify(parsed.role.tier, parsed.environment);
        self.limiter.check(&caller.id, class).map_err(|rejection| {
            let err = self.rate_limited(rejection);
            attempt.fail(Step::RateLimit, State::RateLimited, err)
        })?;

        let policy_context =
            GrantPolicyContext::new(caller.clone(), parsed.environment, parsed.role.tier)
                .with_approval_opt(ctx.approval.clone())
                .with_correlation_id(correlation_id.as_str());
        let card = self
            .gate
            .check(&policy_context)
            .await
            .map_err(|err| attempt.fail(Step::Approval, State::PolicyDenied, err))?;

        match card.decision {
            PolicyDecision::Allow => {}
            PolicyDecision::Deny { reason, policy_id } => {
                return Err(attempt.fail(
                    Step::Approval,
                    State::PolicyDenied,
                    WardenError::PolicyDenied { policy_id, reason },
                ));
            }
            PolicyDecision::RequiresApproval { reason, .. } => {
                attempt.advance(State::ApprovalRequired, Step::Approval)?;
                return Ok(Submitted::Pending { reason });
            }
        }

        attempt.advance(State::ValidatingPrincipal, Step::PrincipalValidation)?;
        let principal = self
            .validator
            .validate(&request.principal_id, request.principal_type)
            .await
            .map_err(|err| attempt.fail(Step::PrincipalValidation, State::ValidationFailed, err))?;

        attempt.advance(State::Scoping, Step::Scoping)?;
        let cluster = self
            .resolve_cluster(request.cluster_name.as_deref())
            .map_err(|err| attempt.fail(Step::Scoping, State::ValidationFailed, err))?;
        attempt.cluster = Some(cluster.name.clone());

        let manifest = self
            .builder
            .build(&GrantInput {
                namespace: &parsed.namespace,
                team: &parsed.team,
                environment: parsed.environment,
                cluster: &cluster,
                principal: &principal,
                role_key: &parsed.role.key,
            })
            .map_err(|err| attempt.fail(Step::Scoping, State::ValidationFailed, err))?;

        attempt.advance(State::Applying, Step::Apply)?;
        let mut outcome = ApplyOutcome::Unchanged;
        for resource in &manifest.resources {
            outcome = self
                .applier
                .apply(resource)
                .await
                .map_err(|err| attempt.fail(Step::Apply, State::ApplyFailed, err))?;
        }
        attempt.advance(State::Applied, Step::Apply)?;

        Ok(Submitted::Created { manifest, outcome })
    }

    fn parse_grant(&self, request: &ProvisionRequest) -> Result<ParsedGrant, WardenError> {
        let namespace = NamespaceName::parse(&request.namespace)?;
        let team = TeamName::parse(&request.team)?;
        let environment: Environment = request.environment.parse()?;
        let role = self.builder.resolve_role(&request.role_key)?.clone();
        Ok(ParsedGrant {
            namespace,
            team,
            environment,
            role,
        })
    }

    /// Assignments currently applied to a namespace.
    #[instrument(skip(self, caller, request, ctx), fields(caller = %caller.id, namespace = %request.namespace))]
    pub async fn status(
        &self,
        caller: &CallerIdentity,
        request: StatusRequest,
        ctx: RequestContext,
    ) -> Result<StatusReport, FailureReport> {
        let started = Instant::now();
        let correlation_id = ctx.correlation();

        let result = self.run_status(caller, &request).await;
        let resource = AuditResource::namespace(request.namespace.as_str());
        self.finish(
            "status",
            AuditAction::StatusQueried,
            caller,
            resource,
            &correlation_id,
            started,
            result,
        )
    }

    async fn run_status(
        &self,
        caller: &CallerIdentity,
        request: &StatusRequest,
    ) -> Result<StatusReport, Failed> {
        self.limiter
            .check(&caller.id, OperationClass::Standard)
            .map_err(|rejection| Failed::new(ProvisioningStep::RateLimit, self.rate_limited(rejection)))?;

        let namespace = NamespaceName::parse(&request.namespace)
            .map_err(|err| Failed::new(ProvisioningStep::Intake, err))?;
        let cluster = self
            .resolve_cluster(request.cluster_name.as_deref())
            .map_err(|err| Failed::new(ProvisioningStep::Scoping, err))?;

        let assignments = self
            .applier
            .status(namespace.as_str(), Some(&cluster.name))
            .await
            .map_err(|err| Failed::new(ProvisioningStep::Status, err))?;

        Ok(StatusReport {
            namespace: namespace.to_string(),
            cluster_name: cluster.name,
            assignments,
        })
    }

    /// Remove every managed assignment from a namespace.
    #[instrument(skip(self, caller, request, ctx), fields(caller = %caller.id, namespace = %request.namespace))]
    pub async fn remove(
        &self,
        caller: &CallerIdentity,
        request: RemoveRequest,
        ctx: RequestContext,
    ) -> Result<RemoveAck, FailureReport> {
        let started = Instant::now();
        let correlation_id = ctx.correlation();

        let result = self.run_remove(caller, &request, &correlation_id).await;
        let mut resource = AuditResource::namespace(request.namespace.as_str());
        if let Ok(ack) = &result {
            resource = resource
                .with_attribute("cluster", ack.cluster_name.as_str())
                .with_attribute("removed", ack.removed.to_string());
        }
        self.finish(
            "remove",
            AuditAction::GrantsRemoved,
            caller,
            resource,
            &correlation_id,
            started,
            result,
        )
    }

    async fn run_remove(
        &self,
        caller: &CallerIdentity,
        request: &RemoveRequest,
        correlation_id: &CorrelationId,
    ) -> Result<RemoveAck, Failed> {
        self.limiter
            .check(&caller.id, OperationClass::NamespaceAdmin)
            .map_err(|rejection| Failed::new(ProvisioningStep::RateLimit, self.rate_limited(rejection)))?;

        let namespace = NamespaceName::parse(&request.namespace)
            .map_err(|err| Failed::new(ProvisioningStep::Intake, err))?;
        let cluster = self
            .resolve_cluster(request.cluster_name.as_deref())
            .map_err(|err| Failed::new(ProvisioningStep::Scoping, err))?;

        let removed = self
            .applier
            .remove(namespace.as_str(), Some(&cluster.name))
            .await
            .map_err(|err| Failed::new(ProvisioningStep::Remove, err))?;

        Ok(RemoveAck {
            correlation_id: correlation_id.clone(),
            namespace: namespace.to_string(),
            cluster_name: cluster.name,
            removed,
        })
    }

    // ========== Registry Operations ==========

    /// Summaries of every registered cluster.
    #[instrument(skip(self, caller, ctx), fields(caller = %caller.id))]
    pub async fn list_clusters(
        &self,
        caller: &CallerIdentity,
        ctx: RequestContext,
    ) -> Result<ClusterList, FailureReport> {
        let started = Instant::now();
        let correlation_id = ctx.correlation();

        let result = self
            .limiter
            .check(&caller.id, OperationClass::Standard)
            .map_err(|rejection| Failed::new(ProvisioningStep::RateLimit, self.rate_limited(rejection)))
            .map(|()| ClusterList {
                clusters: self.registry.list(),
            });

        self.finish(
            "list_clusters",
            AuditAction::ClustersListed,
            caller,
            AuditResource::new(ResourceKind::Platform, "clusters"),
            &correlation_id,
            started,
            result,
        )
    }

    /// Register a cluster. Platform administrators only.
    #[instrument(skip(self, caller, cluster, ctx), fields(caller = %caller.id, cluster = %cluster.name))]
    pub async fn register_cluster(
        &self,
        caller: &CallerIdentity,
        cluster: ClusterConfiguration,
        ctx: RequestContext,
    ) -> Result<(), FailureReport> {
        let started = Instant::now();
        let correlation_id = ctx.correlation();
        let resource = AuditResource::cluster(cluster.name.as_str())
            .with_attribute("environment", cluster.environment.as_str());

        let result = self
            .limiter
            .check(&caller.id, OperationClass::NamespaceAdmin)
            .map_err(|rejection| Failed::new(ProvisioningStep::RateLimit, self.rate_limited(rejection)))
            .and_then(|()| {
                self.registry
                    .add(caller, cluster)
                    .map_err(|err| Failed::new(ProvisioningStep::Registry, err))
            });

        self.finish(
            "register_cluster",
            AuditAction::ClusterRegistered,
            caller,
            resource,
            &correlation_id,
            started,
            result,
        )
    }

    /// Remove a cluster from the registry. Platform administrators only.
    #[instrument(skip(self, caller, ctx), fields(caller = %caller.id))]
    pub async fn deregister_cluster(
        &self,
        caller: &CallerIdentity,
        name: &str,
        ctx: RequestContext,
    ) -> Result<ClusterConfiguration, FailureReport> {
        let started = Instant::now();
        let correlation_id = ctx.correlation();

        let result = self
            .limiter
            .check(&caller.id, OperationClass::NamespaceAdmin)
            .map_err(|rejection| Failed::new(ProvisioningStep::RateLimit, self.rate_limited(rejection)))
            .and_then(|()| {
                self.registry
                    .remove(caller, name)
                    .map_err(|err| Failed::new(ProvisioningStep::Registry, err))
            });

        self.finish(
            "deregister_cluster",
            AuditAction::ClusterRemoved,
            caller,
            AuditResource::cluster(name),
            &correlation_id,
            started,
            result,
        )
    }

    // ========== Health ==========

    /// Health of every dependency breaker.
    pub fn breaker_health(&self) -> Vec<BreakerHealth> {
        let health = self.breakers.health();
        if let Some(metrics) = &self.metrics {
            for breaker in &health {
                metrics.set_breaker_state(&breaker.dependency, breaker.state.as_gauge());
            }
        }
        health
    }

    /// Drain queued audit events and stop the audit worker.
    pub async fn shutdown(&self) {
        self.audit.shutdown().await;
    }

    // ========== Helpers ==========

    fn resolve_cluster(&self, name: Option<&str>) -> Result<ClusterConfiguration, WardenError> {
        let name = name.map(str::trim).filter(|name| !name.is_empty());
        Ok(self.registry.resolve(name)?)
    }

    fn rate_limited(&self, rejection: RateLimitRejection) -> WardenError {
        if let Some(metrics) = &self.metrics {
            metrics.record_rate_limited(rejection.tier.as_str());
        }
        WardenError::RateLimited {
            tier: rejection.tier.to_string(),
            retry_after: rejection.retry_after,
        }
    }

    fn record_request(&self, operation: &str, status: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(operation, status, started.elapsed().as_secs_f64());
        }
    }

    /// Audit and meter a non-submit operation, then sanitize its failure.
    #[allow(clippy::too_many_arguments)]
    fn finish<T>(
        &self,
        operation: &str,
        action: AuditAction,
        caller: &CallerIdentity,
        resource: AuditResource,
        correlation_id: &CorrelationId,
        started: Instant,
        result: Result<T, Failed>,
    ) -> Result<T, FailureReport> {
        let event = AuditEvent::builder(action, correlation_id.clone())
            .actor(AuditActor::caller(caller))
            .resource(resource)
            .duration_ms(started.elapsed().as_millis() as u64);

        match result {
            Ok(value) => {
                self.audit.emit(event.outcome(AuditOutcome::Success).build());
                self.record_request(operation, "ok", started);
                Ok(value)
            }
            Err(failed) => {
                warn!(
                    operation,
                    correlation_id = %correlation_id,
                    step = %failed.step,
                    code = %failed.error.code(),
                    error = %failed.error,
                    "Operation failed"
                );
                self.audit.emit(
                    event
                        .outcome(failed.audit_outcome())
                        .step(failed.step)
                        .build(),
                );
                self.record_request(operation, "failed", started);
                Err(failed.report(correlation_id))
            }
        }
    }
}

/// Assembles a [`Provisioner`] from configuration and injected adapters
pub struct ProvisionerBuilder {
    config: WardenConfig,
    directory: Option<Arc<dyn IdentityDirectory>>,
    control_plane: Option<Arc<dyn ControlPlane>>,
    registry: Option<Arc<dyn ClusterRegistry>>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    metrics: Option<Arc<WardenMetrics>>,
    audit: Option<Arc<AuditEmitter>>,
    gate: Option<ApprovalGate>,
}

impl ProvisionerBuilder {
    pub fn new(config: WardenConfig) -> Self {
        Self {
            config,
            directory: None,
            control_plane: None,
            registry: None,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
            metrics: None,
            audit: None,
            gate: None,
        }
    }

    pub fn directory(mut self, directory: Arc<dyn IdentityDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn control_plane(mut self, control_plane: Arc<dyn ControlPlane>) -> Self {
        self.control_plane = Some(control_plane);
        self
    }

    /// Use `registry` instead of one seeded from the configured clusters.
    pub fn registry(mut self, registry: Arc<dyn ClusterRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn metrics(mut self, metrics: Arc<WardenMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Use an existing emitter instead of spawning one from the audit config.
    pub fn audit(mut self, audit: Arc<AuditEmitter>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn approval_gate(mut self, gate: ApprovalGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Validate the configuration and wire every component.
    ///
    /// Spawns the audit worker when no emitter was supplied, so this must run
    /// inside a tokio runtime.
    pub async fn build(self) -> Result<Provisioner, ConfigError> {
        let config = self.config;
        config.validate()?;

        let directory = self
            .directory
            .ok_or_else(|| ConfigError::invalid("an identity directory is required"))?;
        let control_plane = self
            .control_plane
            .ok_or_else(|| ConfigError::invalid("a control-plane client is required"))?;

        let registry: Arc<dyn ClusterRegistry> = match self.registry {
            Some(registry) => registry,
            None => Arc::new(InMemoryClusterRegistry::from_configurations(
                config.cluster_configurations(),
            )?),
        };

        let breakers = Arc::new(
            BreakerRegistry::new(CircuitBreakerConfig::default(), self.clock.clone())
                .with_override(DIRECTORY_DEPENDENCY, config.breakers.directory.clone())
                .with_override(CONTROL_PLANE_DEPENDENCY, config.breakers.control_plane.clone()),
        );

        let mut validator = PrincipalValidator::new(
            directory,
            breakers.breaker(DIRECTORY_DEPENDENCY),
            config.retry.clone(),
            config.timeouts.directory(),
            self.sleeper.clone(),
            self.clock.clone(),
        )
        .with_cache(&config.principal_cache);

        let mut applier = DeclarativeApplier::new(
            control_plane,
            breakers.breaker(CONTROL_PLANE_DEPENDENCY),
            config.timeouts.control_plane(),
            config.control_plane_namespace.clone(),
        );

        if let Some(metrics) = &self.metrics {
            validator = validator.with_metrics(metrics.clone());
            applier = applier.with_metrics(metrics.clone());
        }

        let audit = match self.audit {
            Some(audit) => audit,
            None => {
                let sinks = config.audit.build_sinks().await?;
                Arc::new(AuditEmitter::spawn(
                    config.audit.queue_capacity,
                    sinks,
                    self.metrics.clone(),
                ))
            }
        };

        let gate = self
            .gate
            .unwrap_or_else(|| ApprovalGate::from_config(&config.approval));

        info!(
            clusters = registry.list().len(),
            roles = config.roles.len(),
            role_table_version = %config.roles.version,
            control_plane_namespace = %config.control_plane_namespace,
            "Provisioner initialized"
        );

        Ok(Provisioner {
            registry,
            builder: GrantManifestBuilder::new(config.roles, config.control_plane_namespace),
            limiter: RateLimiter::new(config.rate_limits, self.clock),
            gate,
            validator,
            applier,
            breakers,
            audit,
            metrics: self.metrics,
        })
    }
}
