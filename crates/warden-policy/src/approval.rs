//! Approval gate assembled from configuration

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::GrantPolicyContext;
use crate::decision::{PolicyDecision, PolicyDecisionCard};
use crate::error::{PolicyError, Result};
use crate::gate::ComposedPolicyGate;
use crate::policies::{PrivilegedProductionPolicy, SelfApprovalPolicy};

/// Approval gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Approvers allowed to sign off privileged production grants; empty
    /// accepts any approver other than the caller
    pub approvers: Vec<String>,

    /// Oldest approval still honored, in seconds
    pub max_signal_age_secs: Option<u64>,

    /// Deny requests whose approval was issued by the caller
    pub deny_self_approval: bool,
}

const DEFAULT_MAX_SIGNAL_AGE_SECS: u64 = 24 * 60 * 60;

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            approvers: Vec::new(),
            max_signal_age_secs: Some(DEFAULT_MAX_SIGNAL_AGE_SECS),
            deny_self_approval: true,
        }
    }
}

impl ApprovalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_signal_age_secs == Some(0) {
            return Err(PolicyError::InvalidConfiguration(
                "max_signal_age_secs must be positive".into(),
            ));
        }
        if self.approvers.iter().any(|a| a.trim().is_empty()) {
            return Err(PolicyError::InvalidConfiguration(
                "approver ids must not be blank".into(),
            ));
        }
        self.max_signal_age()?;
        Ok(())
    }

    /// Configured signal age as a chrono duration, if it fits one.
    pub fn max_signal_age(&self) -> Result<Option<Duration>> {
        self.max_signal_age_secs
            .map(|secs| {
                i64::try_from(secs)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .ok_or_else(|| {
                        PolicyError::InvalidConfiguration(format!(
                            "max_signal_age_secs {} is out of range",
                            secs
                        ))
                    })
            })
            .transpose()
    }
}

/// Pure approval check run before any external dependency is called
#[derive(Debug)]
pub struct ApprovalGate {
    composed: ComposedPolicyGate,
}

impl ApprovalGate {
    pub fn from_config(config: &ApprovalConfig) -> Self {
        let mut privileged =
            PrivilegedProductionPolicy::new().with_approvers(config.approvers.clone());
        match config.max_signal_age() {
            Ok(Some(age)) => privileged = privileged.with_max_signal_age(age),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "Falling back to the default approval signal age");
                privileged = privileged
                    .with_max_signal_age(Duration::seconds(DEFAULT_MAX_SIGNAL_AGE_SECS as i64));
            }
        }

        let mut composed = ComposedPolicyGate::new("warden-approval", "Warden Approval Gate")
            .add_gate(Arc::new(privileged));
        if config.deny_self_approval {
            composed = composed.add_gate(Arc::new(SelfApprovalPolicy::new()));
        }

        Self { composed }
    }

    /// Build from an already composed gate, e.g. with extra policies.
    pub fn from_composed(composed: ComposedPolicyGate) -> Self {
        Self { composed }
    }

    pub fn policy_ids(&self) -> Vec<&str> {
        self.composed.gate_ids()
    }

    pub async fn check(&self, context: &GrantPolicyContext) -> Result<PolicyDecisionCard> {
        let card = self.composed.evaluate_with_card(context).await?;

        match &card.decision {
            PolicyDecision::Allow => {}
            PolicyDecision::RequiresApproval { policy_id, reason, .. } => info!(
                caller = %context.caller.id,
                environment = %context.environment,
                role_tier = %context.role_tier,
                policy_id = %policy_id,
                reason = %reason,
                "Grant held pending approval"
            ),
            PolicyDecision::Deny { policy_id, reason } => warn!(
                caller = %context.caller.id,
                environment = %context.environment,
                role_tier = %context.role_tier,
                policy_id = %policy_id,
                reason = %reason,
                "Grant denied by policy"
            ),
        }

        Ok(card)
    }
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::from_config(&ApprovalConfig::default())
    }
}
