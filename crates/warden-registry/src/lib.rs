//! Warden Registry - Cluster registry and scope construction
//!
//! Holds the set of clusters grants can target and turns a (cluster,
//! namespace) pair into the namespace-qualified scope every role assignment
//! is bound to.
//!
//! ## Key Components
//!
//! - [`ClusterRegistry`]: Lookup and admin-only mutation of registered clusters
//! - [`InMemoryClusterRegistry`]: Lock-protected implementation
//! - [`build_scope`]: `{cluster.resource_id}/namespaces/{namespace}`

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod catalog;
pub mod error;
pub mod memory;
pub mod scope;

pub use catalog::ClusterRegistry;
pub use error::{RegistryError, Result};
pub use memory::InMemoryClusterRegistry;
pub use scope::build_scope;
