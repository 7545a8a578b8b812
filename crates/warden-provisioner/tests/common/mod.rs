//! Shared doubles and fixtures for provisioning scenarios

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use prometheus::Registry;
use tokio::sync::Semaphore;
use warden_observability::{AuditEmitter, AuditEvent, AuditSink, MemoryAuditSink, WardenMetrics};
use warden_policy::ApprovalSignal;
use warden_provisioner::{
    ClusterSeed, ControlPlane, ControlPlaneError, DirectoryEntry, DirectoryError,
    IdentityDirectory, InMemoryControlPlane, InMemoryDirectory, LabelSelector, ManagedResource,
    Provisioner, RequestContext, StoredResource, WardenConfig,
};
use warden_resilience::{CircuitState, ManualClock, ManualSleeper, WindowConfig};
use warden_types::{CallerIdentity, Environment, PrincipalId, PrincipalType, ProvisionRequest};

pub const ALICE: &str = "6f1c2a9e-0b44-4e8a-9c1d-2b7e5f3a8d10";
pub const FRONTEND_GROUP: &str = "0a4b7c1d-2e3f-4a5b-8c6d-7e8f9a0b1c2d";
pub const GHOST: &str = "9e8d7c6b-5a49-4837-a625-14f3e2d1c0b9";

pub const RESOURCE_NAMESPACE: &str = "azure-system";

/// Directory that replays scripted failures before consulting its map
pub struct ScriptedDirectory {
    inner: InMemoryDirectory,
    script: Mutex<VecDeque<DirectoryError>>,
    persistent: Mutex<Option<DirectoryError>>,
    calls: AtomicUsize,
}

impl ScriptedDirectory {
    pub fn new(inner: InMemoryDirectory) -> Self {
        Self {
            inner,
            script: Mutex::new(VecDeque::new()),
            persistent: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_next(&self, error: DirectoryError) {
        self.script.lock().push_back(error);
    }

    pub fn fail_always(&self, error: DirectoryError) {
        *self.persistent.lock() = Some(error);
    }

    pub fn recover(&self) {
        self.script.lock().clear();
        *self.persistent.lock() = None;
    }

    pub fn inner(&self) -> &InMemoryDirectory {
        &self.inner
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityDirectory for ScriptedDirectory {
    async fn lookup(
        &self,
        id: &PrincipalId,
        kind: PrincipalType,
    ) -> Result<DirectoryEntry, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.script.lock().pop_front() {
            return Err(error);
        }
        if let Some(error) = self.persistent.lock().clone() {
            return Err(error);
        }
        self.inner.lookup(id, kind).await
    }
}

/// How the scripted control-plane answers
#[derive(Debug, Clone)]
pub enum ControlPlaneMode {
    Healthy,
    /// Never answers; the applier's timeout fires
    Hang,
    /// Each call waits for a permit before answering normally
    Gated(Arc<Semaphore>),
    Fail(ControlPlaneError),
}

/// Control-plane wrapper with switchable failure modes and call counters
pub struct ScriptedControlPlane {
    inner: InMemoryControlPlane,
    mode: Mutex<ControlPlaneMode>,
    calls: AtomicUsize,
    creates: AtomicUsize,
}

impl ScriptedControlPlane {
    pub fn new(inner: InMemoryControlPlane) -> Self {
        Self {
            inner,
            mode: Mutex::new(ControlPlaneMode::Healthy),
            calls: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: ControlPlaneMode) {
        *self.mode.lock() = mode;
    }

    pub fn inner(&self) -> &InMemoryControlPlane {
        &self.inner
    }

    /// Every call that reached the control-plane
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    async fn gate(&self) -> Result<(), ControlPlaneError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode.lock().clone();
        match mode {
            ControlPlaneMode::Healthy => Ok(()),
            ControlPlaneMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
            ControlPlaneMode::Gated(gate) => {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
                Ok(())
            }
            ControlPlaneMode::Fail(error) => Err(error),
        }
    }
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    async fn create(&self, resource: ManagedResource) -> Result<StoredResource, ControlPlaneError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        self.inner.create(resource).await
    }

    async fn update(&self, resource: ManagedResource) -> Result<StoredResource, ControlPlaneError> {
        self.gate().await?;
        self.inner.update(resource).await
    }

    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<StoredResource>, ControlPlaneError> {
        self.gate().await?;
        self.inner.list(namespace, selector).await
    }

    async fn delete_by_selector(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<usize, ControlPlaneError> {
        self.gate().await?;
        self.inner.delete_by_selector(namespace, selector).await
    }
}

pub fn seed(name: &str, environment: Environment, is_default: bool) -> ClusterSeed {
    ClusterSeed {
        name: name.to_string(),
        environment,
        region: "westeurope".to_string(),
        resource_id: format!(
            "/subscriptions/sub-1/resourceGroups/platform-rg/providers/Microsoft.ContainerService/managedClusters/{name}"
        ),
        resource_group: "platform-rg".to_string(),
        subscription_id: "sub-1".to_string(),
        is_default,
    }
}

/// Two clusters: a default development cluster and a named production one.
/// Both breakers trip after three failures.
pub fn config() -> WardenConfig {
    let mut config = WardenConfig::default();
    config.clusters = vec![
        seed("dev-cluster", Environment::Development, true),
        seed("prod-cluster", Environment::Production, false),
    ];
    config.breakers.directory.failure_threshold = 3;
    config.breakers.control_plane.failure_threshold = 3;
    config.breakers.control_plane.reset_timeout = Duration::from_secs(30);
    config
}

pub struct Harness {
    pub provisioner: Provisioner,
    pub directory: Arc<ScriptedDirectory>,
    pub control_plane: Arc<ScriptedControlPlane>,
    pub sink: Arc<MemoryAuditSink>,
    pub clock: Arc<ManualClock>,
    pub sleeper: Arc<ManualSleeper>,
    pub metrics_registry: Registry,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(config()).await
    }

    pub async fn with_config(config: WardenConfig) -> Self {
        Self::build(config, InMemoryControlPlane::new()).await
    }

    pub async fn build(config: WardenConfig, control_plane: InMemoryControlPlane) -> Self {
        let directory = Arc::new(ScriptedDirectory::new(
            InMemoryDirectory::new()
                .with_user(ALICE, "Alice Example")
                .with_group(FRONTEND_GROUP, "Frontend Engineers"),
        ));
        let control_plane = Arc::new(ScriptedControlPlane::new(control_plane));
        let sink = Arc::new(MemoryAuditSink::new());
        let clock = Arc::new(ManualClock::new());
        let sleeper = Arc::new(ManualSleeper::new());

        let metrics_registry = Registry::new();
        let metrics = Arc::new(WardenMetrics::new(&metrics_registry).unwrap());
        let sinks: Vec<Arc<dyn AuditSink>> = vec![sink.clone()];
        let audit = Arc::new(AuditEmitter::spawn(256, sinks, Some(metrics.clone())));

        let provisioner = Provisioner::builder(config)
            .directory(directory.clone())
            .control_plane(control_plane.clone())
            .clock(clock.clone())
            .sleeper(sleeper.clone())
            .metrics(metrics)
            .audit(audit)
            .build()
            .await
            .unwrap();

        Self {
            provisioner,
            directory,
            control_plane,
            sink,
            clock,
            sleeper,
            metrics_registry,
        }
    }

    /// Audit events written so far, after draining the queue.
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.provisioner.audit().flush().await;
        self.sink.events()
    }
}

/// Health of one dependency breaker: state and consecutive failures.
pub fn breaker_state(h: &Harness, dependency: &str) -> (CircuitState, u32) {
    let health = h.provisioner.breaker_health();
    let breaker = health
        .iter()
        .find(|b| b.dependency == dependency)
        .unwrap();
    (breaker.state, breaker.failure_count)
}

pub fn caller() -> CallerIdentity {
    CallerIdentity::new("dev-user")
}

pub fn approval() -> RequestContext {
    RequestContext::new().with_approval(ApprovalSignal::new("security-lead"))
}

/// A reader grant for ALICE on the default development cluster.
pub fn dev_request(namespace: &str) -> ProvisionRequest {
    ProvisionRequest {
        namespace: namespace.to_string(),
        team: "frontend".to_string(),
        environment: "development".to_string(),
        principal_id: ALICE.to_string(),
        principal_type: None,
        role_key: "reader".to_string(),
        cluster_name: None,
    }
}

/// The privileged production request: admin for the frontend group.
pub fn prod_admin_request() -> ProvisionRequest {
    ProvisionRequest {
        namespace: "frontend-prod".to_string(),
        team: "frontend".to_string(),
        environment: "production".to_string(),
        principal_id: FRONTEND_GROUP.to_string(),
        principal_type: Some(PrincipalType::Group),
        role_key: "admin".to_string(),
        cluster_name: Some("prod-cluster".to_string()),
    }
}

pub fn tight_privileged_window(config: &mut WardenConfig, max_requests: u32) {
    config.rate_limits.privileged = WindowConfig::new(max_requests, Duration::from_secs(600));
}
