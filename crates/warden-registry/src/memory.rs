//! In-memory cluster registry
//!
//! Clusters come from configuration at startup and change only through the
//! admin-gated `add` / `remove` calls.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::{info, warn};
use warden_types::{CallerIdentity, ClusterConfiguration, ClusterSummary, Environment};

use crate::catalog::ClusterRegistry;
use crate::error::{RegistryError, Result};

/// Cluster registry backed by a sorted map
#[derive(Debug, Default)]
pub struct InMemoryClusterRegistry {
    clusters: RwLock<BTreeMap<String, ClusterConfiguration>>,
}

impl InMemoryClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configured clusters, validating each one and
    /// the single-default invariant.
    pub fn from_configurations(
        clusters: impl IntoIterator<Item = ClusterConfiguration>,
    ) -> Result<Self> {
        let mut map = BTreeMap::new();
        for cluster in clusters {
            Self::check(&map, &cluster)?;
            map.insert(cluster.name.clone(), cluster);
        }
        Ok(Self {
            clusters: RwLock::new(map),
        })
    }

    pub fn len(&self) -> usize {
        self.clusters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.read().is_empty()
    }

    fn check(
        existing: &BTreeMap<String, ClusterConfiguration>,
        cluster: &ClusterConfiguration,
    ) -> Result<()> {
        cluster
            .validate()
            .map_err(|err| RegistryError::InvalidCluster(err.to_string()))?;

        if existing.contains_key(&cluster.name) {
            return Err(RegistryError::ClusterAlreadyExists(cluster.name.clone()));
        }
        if cluster.is_default {
            if let Some(current) = existing.values().find(|c| c.is_default) {
                return Err(RegistryError::DuplicateDefault {
                    existing: current.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn authorize(caller: &CallerIdentity, operation: &str) -> Result<()> {
        if caller.platform_admin {
            return Ok(());
        }
        warn!(
            caller = %caller.id,
            operation = operation,
            "Rejected cluster registry mutation from non-admin caller"
        );
        Err(RegistryError::Unauthorized {
            caller: caller.id.clone(),
            operation: operation.to_string(),
        })
    }
}

impl ClusterRegistry for InMemoryClusterRegistry {
    fn default_cluster(&self) -> Result<ClusterConfiguration> {
        self.clusters
            .read()
            .values()
            .find(|c| c.is_default)
            .cloned()
            .ok_or(RegistryError::NoDefaultCluster)
    }

    fn get_by_name(&self, name: &str) -> Result<ClusterConfiguration> {
        self.clusters
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::ClusterNotFound(name.to_string()))
    }

    fn get_by_environment(&self, environment: Environment) -> Result<ClusterConfiguration> {
        self.clusters
            .read()
            .values()
            .find(|c| c.environment == environment)
            .cloned()
            .ok_or(RegistryError::NoClusterForEnvironment(environment))
    }

    fn list(&self) -> Vec<ClusterSummary> {
        self.clusters
            .read()
            .values()
            .map(ClusterConfiguration::summary)
            .collect()
    }

    fn add(&self, caller: &CallerIdentity, cluster: ClusterConfiguration) -> Result<()> {
        Self::authorize(caller, "add cluster")?;

        let mut clusters = self.clusters.write();
        Self::check(&clusters, &cluster)?;

        info!(
            cluster = %cluster.name,
            environment = %cluster.environment,
            caller = %caller.id,
            "Cluster registered"
        );
        clusters.insert(cluster.name.clone(), cluster);
        Ok(())
    }

    fn remove(&self, caller: &CallerIdentity, name: &str) -> Result<ClusterConfiguration> {
        Self::authorize(caller, "remove cluster")?;

        let removed = self
            .clusters
            .write()
            .remove(name)
            .ok_or_else(|| RegistryError::ClusterNotFound(name.to_string()))?;

        info!(cluster = %name, caller = %caller.id, "Cluster removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(name: &str, environment: Environment, is_default: bool) -> ClusterConfiguration {
        ClusterConfiguration {
            name: name.into(),
            environment,
            region: "eastus".into(),
            resource_id: format!(
                "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.ContainerService/managedClusters/{name}"
            ),
            resource_group: "rg".into(),
            subscription_id: "sub-1".into(),
            is_default,
        }
    }

    fn registry() -> InMemoryClusterRegistry {
        InMemoryClusterRegistry::from_configurations([
            cluster("dev-cluster", Environment::Development, true),
            cluster("prod-cluster", Environment::Production, false),
        ])
        .unwrap()
    }

    fn admin() -> CallerIdentity {
        CallerIdentity::new("platform-ops").as_platform_admin()
    }

    #[test]
    fn test_lookups() {
        let registry = registry();

        assert_eq!(registry.default_cluster().unwrap().name, "dev-cluster");
        assert_eq!(registry.get_by_name("prod-cluster").unwrap().name, "prod-cluster");
        assert_eq!(
            registry
                .get_by_environment(Environment::Production)
                .unwrap()
                .name,
            "prod-cluster"
        );
        assert_eq!(
            registry.get_by_environment(Environment::Staging),
            Err(RegistryError::NoClusterForEnvironment(Environment::Staging))
        );
        assert_eq!(
            registry.get_by_name("missing"),
            Err(RegistryError::ClusterNotFound("missing".into()))
        );
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let registry = registry();
        assert_eq!(registry.resolve(None).unwrap().name, "dev-cluster");
        assert_eq!(registry.resolve(Some("prod-cluster")).unwrap().name, "prod-cluster");
    }

    #[test]
    fn test_no_default() {
        let registry = InMemoryClusterRegistry::new();
        assert_eq!(registry.default_cluster(), Err(RegistryError::NoDefaultCluster));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_second_default_rejected() {
        let err = InMemoryClusterRegistry::from_configurations([
            cluster("a", Environment::Development, true),
            cluster("b", Environment::Staging, true),
        ])
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateDefault { existing: "a".into() });

        let registry = registry();
        let err = registry
            .add(&admin(), cluster("staging-cluster", Environment::Staging, true))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateDefault { .. }));
    }

    #[test]
    fn test_mutations_require_admin() {
        let registry = registry();
        let caller = CallerIdentity::new("dev-user");

        let err = registry
            .add(&caller, cluster("staging-cluster", Environment::Staging, false))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized { .. }));
        assert!(registry.remove(&caller, "prod-cluster").is_err());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_admin_add_and_remove() {
        let registry = registry();
        registry
            .add(&admin(), cluster("staging-cluster", Environment::Staging, false))
            .unwrap();

        let names: Vec<_> = registry.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["dev-cluster", "prod-cluster", "staging-cluster"]);

        registry.remove(&admin(), "staging-cluster").unwrap();
        assert_eq!(
            registry.remove(&admin(), "staging-cluster"),
            Err(RegistryError::ClusterNotFound("staging-cluster".into()))
        );
    }

    #[test]
    fn test_invalid_cluster_rejected() {
        let mut bad = cluster("bad", Environment::Development, false);
        bad.resource_id = "not-a-resource-id".into();
        assert!(matches!(
            registry().add(&admin(), bad),
            Err(RegistryError::InvalidCluster(_))
        ));
    }

    #[test]
    fn test_maps_into_warden_error() {
        use warden_types::{ErrorCode, WardenError};

        let err: WardenError = RegistryError::ClusterNotFound("x".into()).into();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err: WardenError = RegistryError::Unauthorized {
            caller: "u".into(),
            operation: "add cluster".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }
}
