//! Grant manifest construction
//!
//! Turns a validated principal, a role key, and a resolved cluster into the
//! desired-state resource the control-plane reconciles. Every input is
//! validated while the manifest is built; nothing is sent anywhere here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_registry::build_scope;
use warden_types::{
    ClusterConfiguration, Environment, NamespaceAccessGrant, NamespaceName,
    PrincipalValidationResult, RoleAssignmentSpec, TeamName, WardenError,
};

use crate::roles::{RoleDefinition, RoleTable};

/// Label marking a resource as owned by Warden
pub const LABEL_MANAGED: &str = "warden.io/managed";
pub const LABEL_NAMESPACE: &str = "warden.io/namespace";
pub const LABEL_TEAM: &str = "warden.io/team";
pub const LABEL_ENVIRONMENT: &str = "warden.io/environment";
pub const LABEL_CLUSTER: &str = "warden.io/cluster";
pub const LABEL_ROLE: &str = "warden.io/role";

/// Longest resource name the control-plane accepts
pub const MAX_RESOURCE_NAME_LEN: usize = 253;

/// Object metadata of a stored resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub name: String,

    /// Control-plane namespace the resource lives in
    pub namespace: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Resource shapes Warden hands to the control-plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ManagedResource {
    RoleAssignment {
        metadata: ResourceMetadata,
        spec: RoleAssignmentSpec,
    },
}

impl ManagedResource {
    pub fn metadata(&self) -> &ResourceMetadata {
        match self {
            Self::RoleAssignment { metadata, .. } => metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata().name
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.metadata().labels
    }

    pub fn role_assignment(&self) -> &RoleAssignmentSpec {
        match self {
            Self::RoleAssignment { spec, .. } => spec,
        }
    }

    /// Whether both resources describe the same desired state, ignoring
    /// metadata.
    pub fn spec_matches(&self, other: &ManagedResource) -> bool {
        match (self, other) {
            (
                Self::RoleAssignment { spec: a, .. },
                Self::RoleAssignment { spec: b, .. },
            ) => a == b,
        }
    }
}

/// Equality-based label selector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Everything Warden manages.
    pub fn managed() -> Self {
        Self::default().with(LABEL_MANAGED, "true")
    }

    /// Managed resources for one workload namespace.
    pub fn for_namespace(namespace: &str) -> Self {
        Self::managed().with(LABEL_NAMESPACE, namespace)
    }

    pub fn with_cluster(self, cluster: &str) -> Self {
        self.with(LABEL_CLUSTER, cluster)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

/// Inputs for one grant
#[derive(Debug, Clone)]
pub struct GrantInput<'a> {
    pub namespace: &'a NamespaceName,
    pub team: &'a TeamName,
    pub environment: Environment,
    pub cluster: &'a ClusterConfiguration,
    pub principal: &'a PrincipalValidationResult,
    pub role_key: &'a str,
}

/// Desired state produced for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantManifest {
    pub grant: NamespaceAccessGrant,
    pub resources: Vec<ManagedResource>,
}

/// Builds grant manifests from the role table
#[derive(Debug, Clone)]
pub struct GrantManifestBuilder {
    roles: RoleTable,
    resource_namespace: String,
}

impl GrantManifestBuilder {
    pub fn new(roles: RoleTable, resource_namespace: impl Into<String>) -> Self {
        Self {
            roles,
            resource_namespace: resource_namespace.into(),
        }
    }

    pub fn roles(&self) -> &RoleTable {
        &self.roles
    }

    /// Control-plane namespace resources are written to.
    pub fn resource_namespace(&self) -> &str {
        &self.resource_namespace
    }

    pub fn resolve_role(&self, role_key: &str) -> Result<&RoleDefinition, WardenError> {
        self.roles.resolve(role_key)
    }

    /// `{namespace}-{team}-{role}-{index}`
    pub fn assignment_name(
        namespace: &NamespaceName,
        team: &TeamName,
        role_key: &str,
        index: usize,
    ) -> String {
        format!("{}-{}-{}-{}", namespace, team, role_key, index)
    }

    /// Name-based UUID the cloud backend uses as the assignment name.
    pub fn remote_name(name: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }

    /// Build the manifest for a single role assignment.
    pub fn build(&self, input: &GrantInput<'_>) -> Result<GrantManifest, WardenError> {
        let role = self.resolve_role(input.role_key)?;

        if input.cluster.environment != input.environment {
            return Err(WardenError::validation(format!(
                "cluster {} serves {}, not {}",
                input.cluster.name, input.cluster.environment, input.environment
            )));
        }
        if !input.principal.verified {
            return Err(WardenError::validation(format!(
                "principal {} has not been verified",
                input.principal.principal_id
            )));
        }

        let scope = build_scope(input.cluster, input.namespace.as_str())?;

        let name = Self::assignment_name(input.namespace, input.team, &role.key, 0);
        if name.len() > MAX_RESOURCE_NAME_LEN {
            return Err(WardenError::validation(format!(
                "assignment name exceeds {} characters",
                MAX_RESOURCE_NAME_LEN
            )));
        }

        let spec = RoleAssignmentSpec {
            remote_name: Self::remote_name(&name),
            name: name.clone(),
            owner: input.cluster.resource_id.clone(),
            principal_id: input.principal.principal_id.clone(),
            principal_type: input.principal.principal_type,
            role_definition_id: role.role_definition_id.clone(),
            scope,
        };

        let labels = BTreeMap::from([
            (LABEL_MANAGED.to_string(), "true".to_string()),
            (LABEL_NAMESPACE.to_string(), input.namespace.to_string()),
            (LABEL_TEAM.to_string(), input.team.to_string()),
            (LABEL_ENVIRONMENT.to_string(), input.environment.to_string()),
            (LABEL_CLUSTER.to_string(), input.cluster.name.clone()),
            (LABEL_ROLE.to_string(), role.key.clone()),
        ]);

        let resource = ManagedResource::RoleAssignment {
            metadata: ResourceMetadata {
                name,
                namespace: self.resource_namespace.clone(),
                labels,
            },
            spec: spec.clone(),
        };

        Ok(GrantManifest {
            grant: NamespaceAccessGrant {
                namespace: input.namespace.clone(),
                team: input.team.clone(),
                environment: input.environment,
                cluster_name: input.cluster.name.clone(),
                assignments: vec![spec],
            },
            resources: vec![resource],
        })
    }
}
