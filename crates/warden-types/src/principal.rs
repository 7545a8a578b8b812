//! Principals and callers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WardenError;
use crate::ids::PrincipalId;

/// Kind of directory principal a grant targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalType {
    User,
    Group,
}

impl PrincipalType {
    /// Lookup order used when the caller gives no type hint.
    pub const LOOKUP_ORDER: [PrincipalType; 2] = [PrincipalType::User, PrincipalType::Group];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Group => "Group",
        }
    }
}

impl FromStr for PrincipalType {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            other => Err(WardenError::validation(format!(
                "unknown principal type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful principal lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalValidationResult {
    pub principal_id: PrincipalId,
    pub principal_type: PrincipalType,
    pub display_name: String,
    pub verified: bool,
    /// Non-fatal notes gathered during lookup (e.g. a fallback miss)
    #[serde(default)]
    pub errors: Vec<String>,
}

impl PrincipalValidationResult {
    pub fn verified(
        principal_id: PrincipalId,
        principal_type: PrincipalType,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            principal_id,
            principal_type,
            display_name: display_name.into(),
            verified: true,
            errors: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.errors.push(note.into());
        self
    }
}

/// Identity of whoever is calling the provisioning core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    pub id: String,

    #[serde(default)]
    pub display_name: Option<String>,

    /// Platform administrators may mutate the cluster registry
    #[serde(default)]
    pub platform_admin: bool,
}

impl CallerIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            platform_admin: false,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn as_platform_admin(mut self) -> Self {
        self.platform_admin = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_type_parsing() {
        assert_eq!("Group".parse::<PrincipalType>().unwrap(), PrincipalType::Group);
        assert_eq!("user".parse::<PrincipalType>().unwrap(), PrincipalType::User);
        assert!("ServicePrincipal".parse::<PrincipalType>().is_err());
    }

    #[test]
    fn test_validation_result_notes() {
        let id = PrincipalId::parse("6f1c2a9e-0b44-4e8a-9c1d-2b7e5f3a8d10").unwrap();
        let result = PrincipalValidationResult::verified(id, PrincipalType::Group, "Frontend")
            .with_note("not found as User");
        assert!(result.verified);
        assert_eq!(result.errors.len(), 1);
    }
}
