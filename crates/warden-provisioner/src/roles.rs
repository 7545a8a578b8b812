//! Versioned role-key table
//!
//! Callers ask for a role by key (`reader`, `writer`, `admin`); the table maps
//! each key to a cloud role-definition id and a privilege tier. The table is
//! loaded once from configuration and falls back to the cloud built-ins.

use serde::{Deserialize, Serialize};
use warden_types::{RoleTier, WardenError};

const ROLE_DEFINITION_PREFIX: &str = "/providers/Microsoft.Authorization/roleDefinitions/";

/// One grantable role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Key callers use in requests
    pub key: String,

    pub tier: RoleTier,

    /// Fully-qualified role-definition id
    pub role_definition_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RoleDefinition {
    /// Built-in role identified by its definition GUID.
    pub fn builtin(key: &str, tier: RoleTier, guid: &str, description: &str) -> Self {
        Self {
            key: key.to_string(),
            tier,
            role_definition_id: format!("{ROLE_DEFINITION_PREFIX}{guid}"),
            description: Some(description.to_string()),
        }
    }
}

/// Role-key → role-definition table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleTable {
    /// Bumped whenever a mapping changes
    pub version: String,

    pub definitions: Vec<RoleDefinition>,
}

impl Default for RoleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RoleTable {
    /// Cloud built-in roles for namespace-scoped cluster RBAC.
    pub fn builtin() -> Self {
        Self {
            version: "2024-01".to_string(),
            definitions: vec![
                RoleDefinition::builtin(
                    "reader",
                    RoleTier::Reader,
                    "7f6c6a51-bcf8-42ba-9220-52d62157d7db",
                    "Azure Kubernetes Service RBAC Reader",
                ),
                RoleDefinition::builtin(
                    "writer",
                    RoleTier::Writer,
                    "a7ffa36f-339b-4b5c-8bdf-e2c188b2c0eb",
                    "Azure Kubernetes Service RBAC Writer",
                ),
                RoleDefinition::builtin(
                    "admin",
                    RoleTier::Admin,
                    "3498e952-d568-435e-9b2c-8d77e338d7f7",
                    "Azure Kubernetes Service RBAC Admin",
                ),
            ],
        }
    }

    /// Look up a role key. Keys are matched case-insensitively.
    pub fn resolve(&self, key: &str) -> Result<&RoleDefinition, WardenError> {
        let wanted = key.trim();
        self.definitions
            .iter()
            .find(|def| def.key.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                WardenError::validation(format!(
                    "unknown role key '{}' (table version {})",
                    key, self.version
                ))
            })
    }

    pub fn keys(&self) -> Vec<&str> {
        self.definitions.iter().map(|def| def.key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn validate(&self) -> Result<(), WardenError> {
        if self.definitions.is_empty() {
            return Err(WardenError::validation("role table must not be empty"));
        }
        if self.version.trim().is_empty() {
            return Err(WardenError::validation("role table must carry a version"));
        }

        let mut seen = std::collections::HashSet::new();
        for def in &self.definitions {
            warden_types::names::validate_label("role key", &def.key)?;
            if !seen.insert(def.key.to_ascii_lowercase()) {
                return Err(WardenError::validation(format!(
                    "role key '{}' is defined more than once",
                    def.key
                )));
            }
            if !def.role_definition_id.starts_with('/') {
                return Err(WardenError::validation(format!(
                    "role '{}' must use a fully-qualified role definition id",
                    def.key
                )));
            }
        }
        Ok(())
    }
}
