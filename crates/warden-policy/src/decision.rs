//! Policy decision types
//!
//! Decisions represent the outcome of policy evaluation. A decision card
//! keeps the per-policy records so the audit trail can show which policy
//! held or denied a request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Policy evaluation decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyDecision {
    /// Request may proceed
    Allow,

    /// Request is refused outright
    Deny {
        /// Reason for denial
        reason: String,
        /// Policy that denied the request
        policy_id: String,
    },

    /// Request must carry a valid approval before it can proceed
    RequiresApproval {
        /// Who can approve
        approvers: Vec<String>,
        /// Reason approval is required
        reason: String,
        /// Policy that requires approval
        policy_id: String,
    },
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self::Allow
    }

    pub fn deny(reason: impl Into<String>, policy_id: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
            policy_id: policy_id.into(),
        }
    }

    pub fn requires_approval(
        approvers: Vec<String>,
        reason: impl Into<String>,
        policy_id: impl Into<String>,
    ) -> Self {
        Self::RequiresApproval {
            approvers,
            reason: reason.into(),
            policy_id: policy_id.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny { .. })
    }

    pub fn requires_human_approval(&self) -> bool {
        matches!(self, Self::RequiresApproval { .. })
    }

    /// Rank used for most-restrictive composition; higher wins.
    pub fn restrictiveness(&self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::RequiresApproval { .. } => 1,
            Self::Deny { .. } => 2,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Deny { reason, .. } | Self::RequiresApproval { reason, .. } => Some(reason),
        }
    }

    pub fn policy_id(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Deny { policy_id, .. } | Self::RequiresApproval { policy_id, .. } => {
                Some(policy_id)
            }
        }
    }
}

/// Record of a single policy evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEvaluationRecord {
    pub policy_id: String,
    pub policy_name: String,
    pub decision: PolicyDecision,
    /// Evaluation duration in microseconds
    pub duration_us: u64,
}

impl PolicyEvaluationRecord {
    pub fn new(
        policy_id: impl Into<String>,
        policy_name: impl Into<String>,
        decision: PolicyDecision,
        duration_us: u64,
    ) -> Self {
        Self {
            policy_id: policy_id.into(),
            policy_name: policy_name.into(),
            decision,
            duration_us,
        }
    }
}

/// Final decision with the evaluations that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecisionCard {
    pub decision: PolicyDecision,
    pub evaluations: Vec<PolicyEvaluationRecord>,
    pub evaluated_at: DateTime<Utc>,
}

impl PolicyDecisionCard {
    pub fn new(decision: PolicyDecision) -> Self {
        Self {
            decision,
            evaluations: Vec::new(),
            evaluated_at: Utc::now(),
        }
    }

    pub fn add_evaluation(&mut self, record: PolicyEvaluationRecord) {
        self.evaluations.push(record);
    }
}
