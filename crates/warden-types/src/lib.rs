//! Warden Types - Core types for namespace access-grant provisioning
//!
//! Warden lets teams request scoped access grants on a shared multi-cluster
//! platform. This crate holds the vocabulary every other Warden crate speaks.
//!
//! ## Key Concepts
//!
//! - **ClusterConfiguration**: A registered cluster a grant can target
//! - **PrincipalId**: Directory object id of the user or group being granted
//! - **Scope**: Namespace-qualified resource path a grant takes effect at
//! - **RoleAssignmentSpec**: Desired state of a single role assignment
//! - **NamespaceAccessGrant**: Aggregate returned to the caller
//! - **WardenError**: Error taxonomy shared across the provisioning pipeline

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod cluster;
pub mod error;
pub mod grant;
pub mod ids;
pub mod names;
pub mod principal;
pub mod request;
pub mod state;

// Re-export main types
pub use cluster::{ClusterConfiguration, ClusterSummary, Environment};
pub use error::{ErrorCode, FailureReport, ProvisioningStep, Result, WardenError};
pub use grant::{
    AssignmentPhase, AssignmentStatus, NamespaceAccessGrant, ProvisioningResult,
    ProvisioningStatus, RoleAssignmentSpec, RoleTier,
};
pub use ids::{CorrelationId, PrincipalId};
pub use names::{NamespaceName, Scope, TeamName};
pub use principal::{CallerIdentity, PrincipalType, PrincipalValidationResult};
pub use request::{
    ClusterList, ProvisionRequest, RemoveAck, RemoveRequest, StatusReport, StatusRequest,
};
pub use state::ProvisioningState;
