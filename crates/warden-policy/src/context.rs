//! Policy evaluation context
//!
//! Carries who is asking for which tier of access in which environment,
//! plus the approval signal the caller attached, if any.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use warden_types::{CallerIdentity, Environment, RoleTier};

/// Context for evaluating a grant request against approval policies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantPolicyContext {
    /// Identity of the requester
    pub caller: CallerIdentity,

    pub environment: Environment,

    /// Privilege tier of the requested role
    pub role_tier: RoleTier,

    /// Approval the caller attached to the request
    pub approval: Option<ApprovalSignal>,

    /// Evaluation time; approval expiry is checked against it
    pub timestamp: DateTime<Utc>,

    /// Request ID for correlation
    pub correlation_id: Option<String>,
}

impl GrantPolicyContext {
    pub fn new(caller: CallerIdentity, environment: Environment, role_tier: RoleTier) -> Self {
        Self {
            caller,
            environment,
            role_tier,
            approval: None,
            timestamp: Utc::now(),
            correlation_id: None,
        }
    }

    pub fn with_approval(mut self, approval: ApprovalSignal) -> Self {
        self.approval = Some(approval);
        self
    }

    pub fn with_approval_opt(mut self, approval: Option<ApprovalSignal>) -> Self {
        self.approval = approval;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Most-privileged tier requested in production
    pub fn is_privileged_production(&self) -> bool {
        self.environment.is_production() && self.role_tier.is_most_privileged()
    }
}

/// Out-of-band approval attached to a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalSignal {
    /// Approver's identity
    pub approver_id: String,

    /// When approval was granted
    pub approved_at: DateTime<Utc>,

    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApprovalSignal {
    /// Tolerated skew between the approver's clock and ours.
    pub const CLOCK_SKEW_SECS: i64 = 300;

    pub fn new(approver_id: impl Into<String>) -> Self {
        Self {
            approver_id: approver_id.into(),
            approved_at: Utc::now(),
            reason: None,
            expires_at: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn approved_at(mut self, approved_at: DateTime<Utc>) -> Self {
        self.approved_at = approved_at;
        self
    }

    /// Whether the approval holds at `now`.
    ///
    /// An approval is invalid if it has expired, was issued in the future
    /// beyond the tolerated skew, or is older than `max_age` when one is
    /// configured.
    pub fn is_valid_at(&self, now: DateTime<Utc>, max_age: Option<Duration>) -> bool {
        if self.approver_id.trim().is_empty()
            || self.approved_at > now + Duration::seconds(Self::CLOCK_SKEW_SECS)
        {
            return false;
        }
        if let Some(expires) = self.expires_at {
            if now >= expires {
                return false;
            }
        }
        match max_age {
            Some(max_age) => now - self.approved_at <= max_age,
            None => true,
        }
    }
}
