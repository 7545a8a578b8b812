//! Privileged production policy
//!
//! Granting the most-privileged role tier in a production environment needs
//! a valid approval signal. Without one the request is held as pending.

use async_trait::async_trait;
use chrono::Duration;

use crate::context::GrantPolicyContext;
use crate::decision::PolicyDecision;
use crate::error::Result;
use crate::gate::PolicyGate;

#[derive(Debug, Clone, Default)]
pub struct PrivilegedProductionPolicy {
    /// Approvers allowed to sign off; empty accepts any approver
    approvers: Vec<String>,

    /// Oldest approval still honored
    max_signal_age: Option<Duration>,
}

impl PrivilegedProductionPolicy {
    pub const ID: &'static str = "privileged-production";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_approvers(mut self, approvers: Vec<String>) -> Self {
        self.approvers = approvers;
        self
    }

    pub fn with_max_signal_age(mut self, max_age: Duration) -> Self {
        self.max_signal_age = Some(max_age);
        self
    }

    fn approver_recognized(&self, approver_id: &str) -> bool {
        self.approvers.is_empty()
            || self
                .approvers
                .iter()
                .any(|known| known.eq_ignore_ascii_case(approver_id))
    }
}

#[async_trait]
impl PolicyGate for PrivilegedProductionPolicy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Privileged Production Approval"
    }

    fn applies_to(&self, context: &GrantPolicyContext) -> bool {
        context.is_privileged_production()
    }

    async fn evaluate(&self, context: &GrantPolicyContext) -> Result<PolicyDecision> {
        let reason = match &context.approval {
            None => format!(
                "{} access in {} requires approval",
                context.role_tier, context.environment
            ),
            Some(signal) if !signal.is_valid_at(context.timestamp, self.max_signal_age) => {
                format!(
                    "approval from {} is expired or not yet valid",
                    signal.approver_id
                )
            }
            Some(signal) if !self.approver_recognized(&signal.approver_id) => {
                format!("{} is not an authorized approver", signal.approver_id)
            }
            Some(_) => return Ok(PolicyDecision::allow()),
        };

        Ok(PolicyDecision::requires_approval(
            self.approvers.clone(),
            reason,
            Self::ID,
        ))
    }
}
