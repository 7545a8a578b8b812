//! Policy gate trait and composition
//!
//! Gates are composed most-restrictive: every applicable gate is evaluated
//! and the strictest decision wins (Deny > RequiresApproval > Allow).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::context::GrantPolicyContext;
use crate::decision::{PolicyDecision, PolicyDecisionCard, PolicyEvaluationRecord};
use crate::error::Result;

/// Policy gate for evaluating grant requests
#[async_trait]
pub trait PolicyGate: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this policy gate
    fn id(&self) -> &str;

    /// Human-readable name for this policy gate
    fn name(&self) -> &str;

    /// Evaluate a request against this policy
    async fn evaluate(&self, context: &GrantPolicyContext) -> Result<PolicyDecision>;

    /// Check if this policy applies to the given request
    fn applies_to(&self, _context: &GrantPolicyContext) -> bool {
        true
    }

    /// Priority of this policy (higher = evaluated first)
    fn priority(&self) -> u32 {
        100
    }
}

/// Gate that evaluates a set of gates and keeps the most restrictive decision
#[derive(Debug)]
pub struct ComposedPolicyGate {
    id: String,
    name: String,
    gates: Vec<Arc<dyn PolicyGate>>,
}

impl ComposedPolicyGate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gates: Vec::new(),
        }
    }

    pub fn add_gate(mut self, gate: Arc<dyn PolicyGate>) -> Self {
        self.gates.push(gate);
        self.gates.sort_by(|a, b| b.priority().cmp(&a.priority()));
        self
    }

    pub fn gate_ids(&self) -> Vec<&str> {
        self.gates.iter().map(|gate| gate.id()).collect()
    }

    /// Evaluate all applicable gates and record each decision.
    pub async fn evaluate_with_card(
        &self,
        context: &GrantPolicyContext,
    ) -> Result<PolicyDecisionCard> {
        let mut card = PolicyDecisionCard::new(PolicyDecision::allow());
        let mut final_decision = PolicyDecision::allow();

        for gate in &self.gates {
            if !gate.applies_to(context) {
                continue;
            }

            let start = Instant::now();
            let decision = gate.evaluate(context).await?;
            let duration_us = start.elapsed().as_micros() as u64;

            debug!(
                policy_id = gate.id(),
                caller = %context.caller.id,
                allowed = decision.is_allowed(),
                "Policy evaluated"
            );

            card.add_evaluation(PolicyEvaluationRecord::new(
                gate.id(),
                gate.name(),
                decision.clone(),
                duration_us,
            ));
            final_decision = Self::more_restrictive(final_decision, decision);
        }

        card.decision = final_decision;
        Ok(card)
    }

    /// Earlier decision wins ties.
    fn more_restrictive(current: PolicyDecision, new: PolicyDecision) -> PolicyDecision {
        if new.restrictiveness() > current.restrictiveness() {
            new
        } else {
            current
        }
    }
}

#[async_trait]
impl PolicyGate for ComposedPolicyGate {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, context: &GrantPolicyContext) -> Result<PolicyDecision> {
        Ok(self.evaluate_with_card(context).await?.decision)
    }
}
