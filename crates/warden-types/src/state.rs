//! Provisioning request lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a single provisioning request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningState {
    Received,
    RateLimited,
    ApprovalRequired,
    PolicyDenied,
    ValidatingPrincipal,
    ValidationFailed,
    Scoping,
    Applying,
    Applied,
    ApplyFailed,
}

impl ProvisioningState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::ApprovalRequired
                | Self::PolicyDenied
                | Self::ValidationFailed
                | Self::Applied
                | Self::ApplyFailed
        )
    }

    /// Edges of the lifecycle graph.
    pub fn can_transition_to(&self, next: ProvisioningState) -> bool {
        use ProvisioningState::*;

        matches!(
            (self, next),
            (Received, RateLimited)
                | (Received, ApprovalRequired)
                | (Received, PolicyDenied)
                | (Received, ValidationFailed)
                | (Received, ValidatingPrincipal)
                | (ValidatingPrincipal, ValidationFailed)
                | (ValidatingPrincipal, Scoping)
                | (Scoping, ValidationFailed)
                | (Scoping, Applying)
                | (Applying, Applied)
                | (Applying, ApplyFailed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::RateLimited => "RATE_LIMITED",
            Self::ApprovalRequired => "APPROVAL_REQUIRED",
            Self::PolicyDenied => "POLICY_DENIED",
            Self::ValidatingPrincipal => "VALIDATING_PRINCIPAL",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::Scoping => "SCOPING",
            Self::Applying => "APPLYING",
            Self::Applied => "APPLIED",
            Self::ApplyFailed => "APPLY_FAILED",
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProvisioningState::*;

    const ALL: [ProvisioningState; 10] = [
        Received,
        RateLimited,
        ApprovalRequired,
        PolicyDenied,
        ValidatingPrincipal,
        ValidationFailed,
        Scoping,
        Applying,
        Applied,
        ApplyFailed,
    ];

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must not exist");
            }
        }
    }

    #[test]
    fn test_no_edges_back_to_received() {
        for from in ALL {
            assert!(!from.can_transition_to(Received));
        }
    }

    #[test]
    fn test_happy_path_edges() {
        assert!(Received.can_transition_to(ValidatingPrincipal));
        assert!(ValidatingPrincipal.can_transition_to(Scoping));
        assert!(Scoping.can_transition_to(Applying));
        assert!(Applying.can_transition_to(Applied));
        assert!(!Received.can_transition_to(Applying));
    }
}
