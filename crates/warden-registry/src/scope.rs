//! Namespace scope construction

use warden_types::{ClusterConfiguration, NamespaceName, Scope};

use crate::error::{RegistryError, Result};

/// Build the namespace-qualified scope for `namespace` on `cluster`.
///
/// The namespace token is validated before any string is assembled, so the
/// result always ends in `/namespaces/{namespace}` and never widens to the
/// cluster.
pub fn build_scope(cluster: &ClusterConfiguration, namespace: &str) -> Result<Scope> {
    let namespace = NamespaceName::parse(namespace)
        .map_err(|err| RegistryError::InvalidNamespace(err.to_string()))?;

    cluster
        .validate()
        .map_err(|err| RegistryError::InvalidCluster(err.to_string()))?;

    Ok(Scope::for_namespace(&cluster.resource_id, &namespace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use warden_types::Environment;

    fn cluster() -> ClusterConfiguration {
        ClusterConfiguration {
            name: "prod-cluster".into(),
            environment: Environment::Production,
            region: "eastus".into(),
            resource_id: "/subscriptions/sub-1/resourceGroups/rg-prod/providers/Microsoft.ContainerService/managedClusters/prod-cluster".into(),
            resource_group: "rg-prod".into(),
            subscription_id: "sub-1".into(),
            is_default: true,
        }
    }

    #[test]
    fn test_scope_is_namespace_qualified() {
        let scope = build_scope(&cluster(), "frontend-prod").unwrap();
        assert_eq!(
            scope.as_str(),
            format!("{}/namespaces/frontend-prod", cluster().resource_id)
        );
        assert_eq!(scope.namespace(), Some("frontend-prod"));
    }

    #[test]
    fn test_rejects_malformed_namespaces() {
        for bad in ["", "Frontend", "front_end", "-frontend", "frontend-", "a/b", "../x"] {
            assert!(
                matches!(build_scope(&cluster(), bad), Err(RegistryError::InvalidNamespace(_))),
                "{bad:?} should be rejected"
            );
        }
        let too_long = "a".repeat(64);
        assert!(build_scope(&cluster(), &too_long).is_err());
    }

    #[test]
    fn test_rejects_broken_cluster() {
        let mut broken = cluster();
        broken.resource_id = format!("{}/namespaces/other", broken.resource_id);
        assert!(matches!(
            build_scope(&broken, "frontend"),
            Err(RegistryError::InvalidCluster(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_valid_labels_always_end_in_namespace(ns in "[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?") {
            let scope = build_scope(&cluster(), &ns).unwrap();
            let expected_suffix = format!("/namespaces/{}", ns);
            prop_assert!(scope.as_str().ends_with(&expected_suffix));
            prop_assert!(scope.as_str().starts_with(&cluster().resource_id));
        }

        #[test]
        fn prop_arbitrary_input_never_escapes(ns in "\\PC{0,80}") {
            if let Ok(scope) = build_scope(&cluster(), &ns) {
                prop_assert_eq!(scope.namespace(), Some(ns.as_str()));
                prop_assert!(!ns.contains('/'));
            }
        }
    }
}
