//! Warden Policy - Approval gate for access grants
//!
//! Every provisioning request passes through the approval gate before any
//! external dependency is called. Policies are composed most-restrictive
//! first: a denial beats a pending approval, which beats an allow.
//!
//! ## Built-in policies
//!
//! - [`PrivilegedProductionPolicy`]: the most-privileged role tier in
//!   production needs a valid approval signal
//! - [`SelfApprovalPolicy`]: a caller cannot approve their own request
//!
//! ## Example
//!
//! ```rust
//! use warden_policy::{ApprovalConfig, ApprovalGate, GrantPolicyContext};
//! use warden_types::{CallerIdentity, Environment, RoleTier};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let gate = ApprovalGate::from_config(&ApprovalConfig::default());
//! let context = GrantPolicyContext::new(
//!     CallerIdentity::new("dev-user"),
//!     Environment::Production,
//!     RoleTier::Admin,
//! );
//!
//! let card = gate.check(&context).await.unwrap();
//! assert!(card.decision.requires_human_approval());
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod approval;
pub mod context;
pub mod decision;
pub mod error;
pub mod gate;
pub mod policies;

pub use approval::{ApprovalConfig, ApprovalGate};
pub use context::{ApprovalSignal, GrantPolicyContext};
pub use decision::{PolicyDecision, PolicyDecisionCard, PolicyEvaluationRecord};
pub use error::{PolicyError, Result};
pub use gate::{ComposedPolicyGate, PolicyGate};
pub use policies::{PrivilegedProductionPolicy, SelfApprovalPolicy};
