//! Built-in approval policies

mod privileged;
mod self_approval;

pub use privileged::PrivilegedProductionPolicy;
pub use self_approval::SelfApprovalPolicy;
