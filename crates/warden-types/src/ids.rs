//! Strongly-typed identifiers for Warden entities
//!
//! Identifiers are wrapped in newtype structs so a correlation id can never be
//! passed where a principal id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::WardenError;

/// Correlation identifier shared by a request, its logs, and its audit trail
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Use the propagated id when present, otherwise mint a new one.
    pub fn propagate_or_generate(propagated: Option<&str>) -> Self {
        match propagated.map(str::trim) {
            Some(id) if !id.is_empty() => Self::new(id),
            _ => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory object id of a user or group.
///
/// Canonical form is a lowercase hyphenated GUID (36 characters). Braced,
/// URN, and unhyphenated spellings are rejected rather than normalised so the
/// same principal always produces the same deterministic assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Length of a hyphenated GUID.
    pub const CANONICAL_LEN: usize = 36;

    pub fn parse(raw: &str) -> Result<Self, WardenError> {
        let candidate = raw.trim();
        if candidate.len() != Self::CANONICAL_LEN || Uuid::try_parse(candidate).is_err() {
            return Err(WardenError::validation(format!(
                "principal id '{}' is not a canonical directory object id",
                raw
            )));
        }
        Ok(Self(candidate.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
