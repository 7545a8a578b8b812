//! Caller-facing request and response shapes

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterSummary;
use crate::grant::AssignmentStatus;
use crate::ids::CorrelationId;
use crate::principal::PrincipalType;

/// Request to provision a namespace access grant.
///
/// Fields are carried as raw strings and validated by the orchestrator so a
/// malformed value produces a validation failure rather than a decode error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    pub namespace: String,
    pub team: String,
    pub environment: String,
    pub principal_id: String,
    #[serde(default)]
    pub principal_type: Option<PrincipalType>,
    pub role_key: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
}

/// Request to list the assignments applied to a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub namespace: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub namespace: String,
    pub cluster_name: String,
    pub assignments: Vec<AssignmentStatus>,
}

/// Request to remove every managed assignment from a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveRequest {
    pub namespace: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveAck {
    pub correlation_id: CorrelationId,
    pub namespace: String,
    pub cluster_name: String,
    /// Resources deleted by this call; zero when already absent
    pub removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterList {
    pub clusters: Vec<ClusterSummary>,
}
