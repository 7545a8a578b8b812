//! Declarative control-plane boundary
//!
//! The control-plane stores desired-state resources and reports how far it
//! got reconciling them through conditions. Warden only reads the `Ready`
//! condition.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_types::AssignmentPhase;

use crate::error::ControlPlaneError;
use crate::manifest::{LabelSelector, ManagedResource};

pub const READY_CONDITION: &str = "Ready";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionSeverity {
    Info,
    Warning,
    Error,
}

/// Reconciliation condition reported by the control-plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,

    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<ConditionSeverity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    pub fn ready(status: ConditionStatus) -> Self {
        Self {
            condition_type: READY_CONDITION.to_string(),
            status,
            severity: None,
            reason: None,
            message: None,
            last_transition_time: Utc::now(),
        }
    }

    pub fn with_severity(mut self, severity: ConditionSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A resource as the control-plane holds it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResource {
    pub resource: ManagedResource,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    pub created_at: DateTime<Utc>,

    /// Incremented on every update
    pub generation: u64,
}

impl StoredResource {
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == READY_CONDITION)
    }

    /// Phase derived from the `Ready` condition.
    ///
    /// `True` is succeeded. `False` with error severity is failed. Anything
    /// else, including a missing condition, is still pending.
    pub fn phase(&self) -> AssignmentPhase {
        match self.ready_condition() {
            Some(c) if c.status == ConditionStatus::True => AssignmentPhase::Succeeded,
            Some(c)
                if c.status == ConditionStatus::False
                    && c.severity == Some(ConditionSeverity::Error) =>
            {
                AssignmentPhase::Failed
            }
            _ => AssignmentPhase::Pending,
        }
    }
}

/// Declarative control-plane client
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Create a resource. Fails with [`ControlPlaneError::AlreadyExists`]
    /// carrying the stored copy when the name is taken.
    async fn create(&self, resource: ManagedResource) -> Result<StoredResource, ControlPlaneError>;

    /// Replace an existing resource.
    async fn update(&self, resource: ManagedResource) -> Result<StoredResource, ControlPlaneError>;

    /// Resources in `namespace` matching `selector`.
    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<StoredResource>, ControlPlaneError>;

    /// Delete every resource in `namespace` matching `selector`, returning
    /// how many were removed.
    async fn delete_by_selector(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<usize, ControlPlaneError>;
}

type ResourceKey = (String, String);

fn key_of(resource: &ManagedResource) -> ResourceKey {
    let metadata = resource.metadata();
    (metadata.namespace.clone(), metadata.name.clone())
}

/// In-process control-plane for development and tests
///
/// Resources reconcile instantly unless created with [`Self::deferred`], in
/// which case they stay pending until [`Self::set_condition`] is called.
#[derive(Debug, Default)]
pub struct InMemoryControlPlane {
    resources: RwLock<BTreeMap<ResourceKey, StoredResource>>,
    deferred: bool,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Control-plane that leaves new resources pending.
    pub fn deferred() -> Self {
        Self {
            resources: RwLock::new(BTreeMap::new()),
            deferred: true,
        }
    }

    /// Replace the condition of the same type on a stored resource.
    pub fn set_condition(&self, namespace: &str, name: &str, condition: Condition) -> bool {
        let mut resources = self.resources.write();
        match resources.get_mut(&(namespace.to_string(), name.to_string())) {
            Some(stored) => {
                stored
                    .conditions
                    .retain(|c| c.condition_type != condition.condition_type);
                stored.conditions.push(condition);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<StoredResource> {
        self.resources
            .read()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    fn initial_conditions(&self) -> Vec<Condition> {
        if self.deferred {
            vec![Condition::ready(ConditionStatus::Unknown).with_reason("Reconciling")]
        } else {
            vec![Condition::ready(ConditionStatus::True).with_reason("Succeeded")]
        }
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn create(&self, resource: ManagedResource) -> Result<StoredResource, ControlPlaneError> {
        let key = key_of(&resource);
        let mut resources = self.resources.write();

        if let Some(existing) = resources.get(&key) {
            return Err(ControlPlaneError::AlreadyExists(Box::new(existing.clone())));
        }

        let stored = StoredResource {
            resource,
            conditions: self.initial_conditions(),
            created_at: Utc::now(),
            generation: 1,
        };
        debug!(namespace = %key.0, name = %key.1, "Resource created");
        resources.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update(&self, resource: ManagedResource) -> Result<StoredResource, ControlPlaneError> {
        let key = key_of(&resource);
        let mut resources = self.resources.write();

        let stored = resources
            .get_mut(&key)
            .ok_or_else(|| ControlPlaneError::NotFound(key.1.clone()))?;
        stored.resource = resource;
        stored.generation += 1;
        debug!(
            namespace = %key.0,
            name = %key.1,
            generation = stored.generation,
            "Resource updated"
        );
        Ok(stored.clone())
    }

    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<StoredResource>, ControlPlaneError> {
        Ok(self
            .resources
            .read()
            .iter()
            .filter(|((ns, _), stored)| ns == namespace && selector.matches(stored.resource.labels()))
            .map(|(_, stored)| stored.clone())
            .collect())
    }

    async fn delete_by_selector(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<usize, ControlPlaneError> {
        let mut resources = self.resources.write();
        let before = resources.len();
        resources.retain(|(ns, _), stored| {
            !(ns == namespace && selector.matches(stored.resource.labels()))
        });
        Ok(before - resources.len())
    }
}
