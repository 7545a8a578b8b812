//! Configuration for the provisioning core
//!
//! Values are layered: built-in defaults, then an optional file, then
//! `WARDEN__*` environment variables (`WARDEN__RATE_LIMITS__PRIVILEGED__MAX_REQUESTS=5`).

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_observability::{AuditConfig, TracingConfig};
use warden_policy::ApprovalConfig;
use warden_resilience::{CircuitBreakerConfig, RateLimitConfig, RetryPolicy};
use warden_types::{ClusterConfiguration, Environment};

use crate::error::ConfigError;
use crate::principal::PrincipalCacheConfig;
use crate::roles::RoleTable;

/// Main provisioner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Per-dependency breaker settings
    #[serde(default)]
    pub breakers: BreakersConfig,

    /// Retry policy for principal lookups
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Per-call timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub principal_cache: PrincipalCacheConfig,

    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    #[serde(default)]
    pub approval: ApprovalConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub logging: TracingConfig,

    /// Control-plane namespace managed resources are written to
    #[serde(default = "default_control_plane_namespace")]
    pub control_plane_namespace: String,

    /// Clusters registered at startup
    #[serde(default)]
    pub clusters: Vec<ClusterSeed>,

    /// Role-key table
    #[serde(default)]
    pub roles: RoleTable,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            breakers: BreakersConfig::default(),
            retry: RetryPolicy::default(),
            timeouts: TimeoutConfig::default(),
            principal_cache: PrincipalCacheConfig::default(),
            rate_limits: RateLimitConfig::default(),
            approval: ApprovalConfig::default(),
            audit: AuditConfig::default(),
            logging: TracingConfig::default(),
            control_plane_namespace: default_control_plane_namespace(),
            clusters: Vec::new(),
            roles: RoleTable::default(),
        }
    }
}

/// Breaker settings for each external dependency
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakersConfig {
    #[serde(default)]
    pub directory: CircuitBreakerConfig,

    #[serde(default)]
    pub control_plane: CircuitBreakerConfig,
}

/// Timeouts applied to each external call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Identity directory lookup timeout in milliseconds
    #[serde(default = "default_directory_timeout")]
    pub directory_ms: u64,

    /// Control-plane call timeout in milliseconds
    #[serde(default = "default_control_plane_timeout")]
    pub control_plane_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            directory_ms: default_directory_timeout(),
            control_plane_ms: default_control_plane_timeout(),
        }
    }
}

impl TimeoutConfig {
    pub fn directory(&self) -> Duration {
        Duration::from_millis(self.directory_ms)
    }

    pub fn control_plane(&self) -> Duration {
        Duration::from_millis(self.control_plane_ms)
    }
}

/// Cluster entry as written in configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSeed {
    pub name: String,
    pub environment: Environment,
    pub region: String,
    pub resource_id: String,
    pub resource_group: String,
    pub subscription_id: String,
    #[serde(default)]
    pub is_default: bool,
}

impl From<ClusterSeed> for ClusterConfiguration {
    fn from(seed: ClusterSeed) -> Self {
        ClusterConfiguration {
            name: seed.name,
            environment: seed.environment,
            region: seed.region,
            resource_id: seed.resource_id,
            resource_group: seed.resource_group,
            subscription_id: seed.subscription_id,
            is_default: seed.is_default,
        }
    }
}

impl From<&ClusterConfiguration> for ClusterSeed {
    fn from(cluster: &ClusterConfiguration) -> Self {
        ClusterSeed {
            name: cluster.name.clone(),
            environment: cluster.environment,
            region: cluster.region.clone(),
            resource_id: cluster.resource_id.clone(),
            resource_group: cluster.resource_group.clone(),
            subscription_id: cluster.subscription_id.clone(),
            is_default: cluster.is_default,
        }
    }
}

// Default value helpers
fn default_control_plane_namespace() -> String {
    "azure-system".to_string()
}

fn default_directory_timeout() -> u64 {
    5_000
}

fn default_control_plane_timeout() -> u64 {
    10_000
}

impl WardenConfig {
    /// Load configuration from defaults, an optional file, and environment
    /// variables, then validate it.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("WARDEN")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.breakers.directory.validate()?;
        self.breakers.control_plane.validate()?;
        self.retry.validate()?;
        self.rate_limits.validate()?;
        self.approval.validate()?;
        self.roles.validate()?;

        if self.timeouts.directory_ms == 0 || self.timeouts.control_plane_ms == 0 {
            return Err(ConfigError::invalid("timeouts must be positive"));
        }
        if self.audit.queue_capacity == 0 {
            return Err(ConfigError::invalid("audit.queue_capacity must be at least 1"));
        }
        warden_types::names::validate_label("control_plane_namespace", &self.control_plane_namespace)?;

        let mut names = HashSet::new();
        let mut default: Option<&str> = None;
        for seed in &self.clusters {
            ClusterConfiguration::from(seed.clone()).validate()?;
            if !names.insert(seed.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "cluster {} is configured more than once",
                    seed.name
                )));
            }
            if seed.is_default {
                if let Some(existing) = default {
                    return Err(ConfigError::invalid(format!(
                        "clusters {} and {} are both marked default",
                        existing, seed.name
                    )));
                }
                default = Some(seed.name.as_str());
            }
        }
        Ok(())
    }

    /// Cluster seeds as registry entries.
    pub fn cluster_configurations(&self) -> Vec<ClusterConfiguration> {
        self.clusters.iter().cloned().map(Into::into).collect()
    }
}
