//! Cluster configuration and deployment environments

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WardenError;
use crate::names::validate_label;

/// Deployment environment a cluster and a grant belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[serde(alias = "dev")]
    Development,
    #[serde(alias = "stage")]
    Staging,
    #[serde(alias = "prod")]
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" | "stage" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(WardenError::validation(format!(
                "unknown environment '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered cluster grants can be provisioned against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfiguration {
    /// Short registry name, e.g. `prod-cluster`
    pub name: String,

    pub environment: Environment,

    pub region: String,

    /// Fully-qualified cloud resource id of the cluster
    pub resource_id: String,

    pub resource_group: String,

    pub subscription_id: String,

    #[serde(default)]
    pub is_default: bool,
}

impl ClusterConfiguration {
    /// Check the fields a scope will be built from.
    pub fn validate(&self) -> Result<(), WardenError> {
        validate_label("cluster name", &self.name)?;

        let id = self.resource_id.as_str();
        if !id.starts_with('/') || id.ends_with('/') || id.chars().any(char::is_whitespace) {
            return Err(WardenError::validation(format!(
                "cluster {} has malformed resource id '{}'",
                self.name, id
            )));
        }
        if id.to_ascii_lowercase().contains("/namespaces/") {
            return Err(WardenError::validation(format!(
                "cluster {} resource id must not already be namespace-qualified",
                self.name
            )));
        }
        if self.subscription_id.trim().is_empty() || self.resource_group.trim().is_empty() {
            return Err(WardenError::validation(format!(
                "cluster {} must name its subscription and resource group",
                self.name
            )));
        }
        Ok(())
    }

    pub fn summary(&self) -> ClusterSummary {
        ClusterSummary {
            name: self.name.clone(),
            environment: self.environment,
            region: self.region.clone(),
            is_default: self.is_default,
        }
    }
}

/// Public projection of a cluster for listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub name: String,
    pub environment: Environment,
    pub region: String,
    pub is_default: bool,
}
