//! Cluster registry trait

use warden_types::{CallerIdentity, ClusterConfiguration, ClusterSummary, Environment};

use crate::error::Result;

/// Registry of clusters that grants can be provisioned against.
///
/// At most one cluster is the default. Mutations require a caller with the
/// platform-admin flag.
pub trait ClusterRegistry: Send + Sync {
    /// The cluster marked as default.
    fn default_cluster(&self) -> Result<ClusterConfiguration>;

    fn get_by_name(&self, name: &str) -> Result<ClusterConfiguration>;

    /// First registered cluster (by name) for an environment.
    fn get_by_environment(&self, environment: Environment) -> Result<ClusterConfiguration>;

    /// The named cluster, or the default when no name is given.
    fn resolve(&self, name: Option<&str>) -> Result<ClusterConfiguration> {
        match name {
            Some(name) => self.get_by_name(name),
            None => self.default_cluster(),
        }
    }

    /// Summaries of every registered cluster, sorted by name.
    fn list(&self) -> Vec<ClusterSummary>;

    fn add(&self, caller: &CallerIdentity, cluster: ClusterConfiguration) -> Result<()>;

    fn remove(&self, caller: &CallerIdentity, name: &str) -> Result<ClusterConfiguration>;
}
