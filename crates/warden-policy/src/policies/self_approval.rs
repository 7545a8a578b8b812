//! Self-approval policy
//!
//! An approval signal issued by the requesting caller is a denial, whatever
//! tier or environment the request targets.

use async_trait::async_trait;

use crate::context::GrantPolicyContext;
use crate::decision::PolicyDecision;
use crate::error::Result;
use crate::gate::PolicyGate;

#[derive(Debug, Clone, Default)]
pub struct SelfApprovalPolicy;

impl SelfApprovalPolicy {
    pub const ID: &'static str = "self-approval";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PolicyGate for SelfApprovalPolicy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Self Approval Prohibition"
    }

    fn applies_to(&self, context: &GrantPolicyContext) -> bool {
        context.approval.is_some()
    }

    fn priority(&self) -> u32 {
        200
    }

    async fn evaluate(&self, context: &GrantPolicyContext) -> Result<PolicyDecision> {
        match &context.approval {
            Some(signal) if signal.approver_id.eq_ignore_ascii_case(&context.caller.id) => {
                Ok(PolicyDecision::deny(
                    format!("{} cannot approve their own request", context.caller.id),
                    Self::ID,
                ))
            }
            _ => Ok(PolicyDecision::allow()),
        }
    }
}
