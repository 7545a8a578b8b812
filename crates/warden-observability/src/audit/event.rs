//! Audit event types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_types::{CallerIdentity, CorrelationId, ProvisioningState, ProvisioningStep};

use super::mask::mask_principal;

/// One audit record per provisioning attempt or query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: Uuid,

    pub timestamp: DateTime<Utc>,

    pub correlation_id: CorrelationId,

    pub actor: AuditActor,

    pub action: AuditAction,

    pub resource: AuditResource,

    /// Masked principal id; never the raw value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_masked: Option<String>,

    pub outcome: AuditOutcome,

    pub severity: AuditSeverity,

    pub retention: RetentionClass,

    /// Lifecycle state the request ended in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ProvisioningState>,

    /// Step a failure originated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<ProvisioningStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Mandatory events are kept over best-effort ones when the queue is full
    pub mandatory: bool,
}

impl AuditEvent {
    pub fn builder(action: AuditAction, correlation_id: CorrelationId) -> AuditEventBuilder {
        AuditEventBuilder::new(action, correlation_id)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AuditOutcome::Success)
    }
}

/// Builder for audit events
#[derive(Debug)]
pub struct AuditEventBuilder {
    action: AuditAction,
    correlation_id: CorrelationId,
    actor: AuditActor,
    resource: AuditResource,
    principal_masked: Option<String>,
    outcome: AuditOutcome,
    elevated: bool,
    severity: Option<AuditSeverity>,
    retention: Option<RetentionClass>,
    state: Option<ProvisioningState>,
    step: Option<ProvisioningStep>,
    duration_ms: Option<u64>,
}

impl AuditEventBuilder {
    pub fn new(action: AuditAction, correlation_id: CorrelationId) -> Self {
        Self {
            action,
            correlation_id,
            actor: AuditActor::system("warden"),
            resource: AuditResource::new(ResourceKind::Platform, "warden"),
            principal_masked: None,
            outcome: AuditOutcome::Success,
            elevated: false,
            severity: None,
            retention: None,
            state: None,
            step: None,
            duration_ms: None,
        }
    }

    pub fn actor(mut self, actor: AuditActor) -> Self {
        self.actor = actor;
        self
    }

    pub fn resource(mut self, resource: AuditResource) -> Self {
        self.resource = resource;
        self
    }

    /// Record the principal the action concerned; the value is masked here.
    pub fn principal(mut self, raw: &str) -> Self {
        self.principal_masked = Some(mask_principal(raw));
        self
    }

    pub fn outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Mark the event as concerning a privileged-role grant.
    pub fn privileged(mut self, privileged: bool) -> Self {
        self.elevated |= privileged;
        self
    }

    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn retention(mut self, retention: RetentionClass) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn state(mut self, state: ProvisioningState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn step(mut self, step: ProvisioningStep) -> Self {
        self.step = Some(step);
        self
    }

    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Build the event.
    ///
    /// Unless set explicitly, severity is `High` for privileged grants and
    /// policy denials, `Warning` for other failures, `Info` otherwise.
    /// Retention follows severity and whether the action is a write.
    pub fn build(self) -> AuditEvent {
        let severity = self.severity.unwrap_or_else(|| {
            if self.elevated || matches!(self.outcome, AuditOutcome::Denied { .. }) {
                AuditSeverity::High
            } else if matches!(self.outcome, AuditOutcome::Failure { .. }) {
                AuditSeverity::Warning
            } else {
                AuditSeverity::Info
            }
        });

        let retention = self.retention.unwrap_or(match severity {
            AuditSeverity::High => RetentionClass::Compliance,
            _ if self.action.is_write() => RetentionClass::Extended,
            _ => RetentionClass::Standard,
        });

        AuditEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            correlation_id: self.correlation_id,
            mandatory: self.action.is_write(),
            actor: self.actor,
            action: self.action,
            resource: self.resource,
            principal_masked: self.principal_masked,
            outcome: self.outcome,
            severity,
            retention,
            state: self.state,
            step: self.step,
            duration_ms: self.duration_ms,
        }
    }
}

/// Who performed the action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditActor {
    pub actor_type: ActorType,

    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AuditActor {
    pub fn system(component: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::System,
            id: component.into(),
            name: None,
        }
    }

    pub fn caller(caller: &CallerIdentity) -> Self {
        Self {
            actor_type: if caller.platform_admin {
                ActorType::PlatformAdmin
            } else {
                ActorType::User
            },
            id: caller.id.clone(),
            name: caller.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    User,
    PlatformAdmin,
    System,
}

/// Audited operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    GrantProvisioned,
    GrantsRemoved,
    StatusQueried,
    ClustersListed,
    ClusterRegistered,
    ClusterRemoved,
}

impl AuditAction {
    /// Writes produce mandatory audit events.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::GrantProvisioned
                | Self::GrantsRemoved
                | Self::ClusterRegistered
                | Self::ClusterRemoved
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GrantProvisioned => "grant_provisioned",
            Self::GrantsRemoved => "grants_removed",
            Self::StatusQueried => "status_queried",
            Self::ClustersListed => "clusters_listed",
            Self::ClusterRegistered => "cluster_registered",
            Self::ClusterRemoved => "cluster_removed",
        }
    }
}

/// What the action was applied to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResource {
    pub kind: ResourceKind,

    pub id: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl AuditResource {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self::new(ResourceKind::Namespace, namespace)
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Cluster, name)
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Namespace,
    Cluster,
    Platform,
}

/// Outcome of the audited action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    /// Held for approval
    Pending { reason: String },
    /// Refused by a policy
    Denied { policy_id: String, reason: String },
    Failure { code: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    High,
}

/// How long a record must be kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionClass {
    Standard,
    Extended,
    Compliance,
}
