//! Validated name tokens and namespace scopes
//!
//! Namespace and team names end up inside resource paths and resource names,
//! so they are checked against the DNS-1123 label rules before any string is
//! built from them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::WardenError;

/// Maximum length of a DNS-1123 label.
pub const MAX_LABEL_LEN: usize = 63;

/// Check a token against the DNS-1123 label rules: 1-63 characters of
/// lowercase ASCII letters, digits, and `-`, starting and ending with an
/// alphanumeric character.
pub fn validate_label(kind: &str, value: &str) -> Result<(), WardenError> {
    if value.is_empty() || value.len() > MAX_LABEL_LEN {
        return Err(WardenError::validation(format!(
            "{} must be 1-{} characters, got {}",
            kind,
            MAX_LABEL_LEN,
            value.len()
        )));
    }

    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-';
    if let Some(bad) = value.chars().find(|c| !allowed(*c)) {
        return Err(WardenError::validation(format!(
            "{} '{}' contains invalid character {:?}",
            kind,
            value.escape_debug(),
            bad
        )));
    }

    if value.starts_with('-') || value.ends_with('-') {
        return Err(WardenError::validation(format!(
            "{} '{}' must start and end with a letter or digit",
            kind, value
        )));
    }

    Ok(())
}

/// A namespace name that passed label validation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespaceName(String);

impl NamespaceName {
    pub fn parse(raw: &str) -> Result<Self, WardenError> {
        validate_label("namespace", raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NamespaceName {
    type Error = WardenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_label("namespace", &value)?;
        Ok(Self(value))
    }
}

impl From<NamespaceName> for String {
    fn from(value: NamespaceName) -> Self {
        value.0
    }
}

impl fmt::Display for NamespaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A team name that passed label validation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TeamName(String);

impl TeamName {
    pub fn parse(raw: &str) -> Result<Self, WardenError> {
        validate_label("team", raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TeamName {
    type Error = WardenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_label("team", &value)?;
        Ok(Self(value))
    }
}

impl From<TeamName> for String {
    fn from(value: TeamName) -> Self {
        value.0
    }
}

impl fmt::Display for TeamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resource path at which a grant takes effect.
///
/// Always `{clusterResourceId}/namespaces/{namespace}`; a cluster-wide scope
/// cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub const NAMESPACE_SEGMENT: &'static str = "/namespaces/";

    pub fn for_namespace(cluster_resource_id: &str, namespace: &NamespaceName) -> Self {
        let base = cluster_resource_id.trim_end_matches('/');
        Self(format!("{}{}{}", base, Self::NAMESPACE_SEGMENT, namespace))
    }

    /// Namespace the scope is qualified with.
    pub fn namespace(&self) -> Option<&str> {
        self.0
            .rsplit_once(Self::NAMESPACE_SEGMENT)
            .map(|(_, namespace)| namespace)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
