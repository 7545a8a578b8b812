//! # Warden Provisioner
//!
//! Namespace access-grant provisioning core.
//!
//! ## Overview
//!
//! The [`Provisioner`] is the single entry point for grant operations. Each
//! submit walks a fixed lifecycle:
//!
//! - Intake validation of namespace, team, environment, and role key
//! - Per-caller rate limiting by operation class
//! - The approval gate for privileged production grants
//! - Principal validation against the identity directory, behind a breaker
//!   with bounded retries and a TTL cache
//! - Cluster resolution, scoping, and manifest construction
//! - Idempotent create-or-update of the role assignment on the
//!   declarative control-plane, behind its own breaker
//!
//! Every attempt records its lifecycle trace, a request metric, and an audit
//! event with the principal masked.
//!
//! ## Key Components
//!
//! - [`Provisioner`] / [`ProvisionerBuilder`]: orchestration and wiring
//! - [`PrincipalValidator`] and [`IdentityDirectory`]: directory lookups
//! - [`GrantManifestBuilder`]: desired-state construction from the [`RoleTable`]
//! - [`DeclarativeApplier`] and [`ControlPlane`]: apply, status, remove
//! - [`WardenConfig`]: layered configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_provisioner::{
//!     InMemoryControlPlane, InMemoryDirectory, Provisioner, RequestContext, WardenConfig,
//! };
//! use warden_types::{CallerIdentity, ProvisionRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provisioner = Provisioner::builder(WardenConfig::load(Some("warden.toml"))?)
//!     .directory(Arc::new(InMemoryDirectory::new()))
//!     .control_plane(Arc::new(InMemoryControlPlane::new()))
//!     .build()
//!     .await?;
//!
//! let result = provisioner
//!     .submit(
//!         &CallerIdentity::new("alice"),
//!         ProvisionRequest {
//!             namespace: "payments".into(),
//!             team: "checkout".into(),
//!             environment: "development".into(),
//!             principal_id: "1b2c3d4e-0000-4000-8000-000000000001".into(),
//!             principal_type: None,
//!             role_key: "writer".into(),
//!             cluster_name: None,
//!         },
//!         RequestContext::new(),
//!     )
//!     .await;
//! println!("{} {:?}", result.status, result.assignment_ids);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod applier;
pub mod config;
pub mod control_plane;
pub mod error;
pub mod lifecycle;
pub mod manifest;
pub mod orchestrator;
pub mod principal;
pub mod roles;

pub use applier::{ApplyOutcome, DeclarativeApplier, CONTROL_PLANE_DEPENDENCY};
pub use config::{BreakersConfig, ClusterSeed, TimeoutConfig, WardenConfig};
pub use control_plane::{
    Condition, ConditionSeverity, ConditionStatus, ControlPlane, InMemoryControlPlane,
    StoredResource, READY_CONDITION,
};
pub use error::{ConfigError, ControlPlaneError, DirectoryError};
pub use lifecycle::LifecycleTracker;
pub use manifest::{
    GrantInput, GrantManifest, GrantManifestBuilder, LabelSelector, ManagedResource,
    ResourceMetadata,
};
pub use orchestrator::{classify, Provisioner, ProvisionerBuilder, RequestContext};
pub use principal::{
    DirectoryEntry, IdentityDirectory, InMemoryDirectory, PrincipalCacheConfig,
    PrincipalValidator, DIRECTORY_DEPENDENCY,
};
pub use roles::{RoleDefinition, RoleTable};
