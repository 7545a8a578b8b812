//! Grant desired-state types and provisioning results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::cluster::Environment;
use crate::error::FailureReport;
use crate::ids::{CorrelationId, PrincipalId};
use crate::names::{NamespaceName, Scope, TeamName};
use crate::principal::PrincipalType;
use crate::state::ProvisioningState;

/// Privilege tier of a role definition, least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleTier {
    Reader,
    Writer,
    Admin,
}

impl RoleTier {
    /// Admin is the most powerful role this core ever grants at namespace scope.
    pub fn is_most_privileged(&self) -> bool {
        matches!(self, Self::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for RoleTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired state of one role assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignmentSpec {
    /// Deterministic resource name: `{namespace}-{team}-{role}-{index}`
    pub name: String,

    /// Name-based UUID derived from `name`, used as the remote assignment name
    pub remote_name: Uuid,

    /// Owner scope: the cluster resource id
    pub owner: String,

    pub principal_id: PrincipalId,

    pub principal_type: PrincipalType,

    pub role_definition_id: String,

    /// Effective scope, always namespace-qualified
    pub scope: Scope,
}

/// Aggregate desired state returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceAccessGrant {
    pub namespace: NamespaceName,
    pub team: TeamName,
    pub environment: Environment,
    pub cluster_name: String,
    pub assignments: Vec<RoleAssignmentSpec>,
}

impl NamespaceAccessGrant {
    pub fn assignment_ids(&self) -> Vec<String> {
        self.assignments.iter().map(|a| a.name.clone()).collect()
    }
}

/// Reconciliation phase reported by the control-plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentPhase {
    Pending,
    Succeeded,
    Failed,
}

impl fmt::Display for AssignmentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Status projection of an applied assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentStatus {
    pub name: String,
    pub principal_id: PrincipalId,
    pub role_definition_id: String,
    pub scope: Scope,
    pub phase: AssignmentPhase,
    pub created_at: DateTime<Utc>,
}

/// Caller-visible status of a provisioning request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisioningStatus {
    Created,
    PendingApproval,
    Failed,
}

impl ProvisioningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::PendingApproval => "pending-approval",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ProvisioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a submit call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningResult {
    pub correlation_id: CorrelationId,
    pub status: ProvisioningStatus,
    pub assignment_ids: Vec<String>,
    pub message: String,
    pub duration_ms: u64,

    /// Terminal lifecycle state the request stopped in
    pub state: ProvisioningState,

    /// Every state the request passed through, in order
    pub trace: Vec<ProvisioningState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<NamespaceAccessGrant>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
}

impl ProvisioningResult {
    pub fn is_created(&self) -> bool {
        self.status == ProvisioningStatus::Created
    }

    pub fn is_pending_approval(&self) -> bool {
        self.status == ProvisioningStatus::PendingApproval
    }

    pub fn is_failed(&self) -> bool {
        self.status == ProvisioningStatus::Failed
    }
}
