//! Per-request lifecycle tracking

use tracing::debug;
use warden_types::{ProvisioningState, WardenError};

/// Walks one request through the provisioning state machine.
///
/// Every transition is checked against the lifecycle graph, so no state is
/// entered twice and nothing leaves a terminal state.
#[derive(Debug, Clone)]
pub struct LifecycleTracker {
    trace: Vec<ProvisioningState>,
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self {
            trace: vec![ProvisioningState::Received],
        }
    }

    pub fn current(&self) -> ProvisioningState {
        // The trace always starts with RECEIVED.
        self.trace
            .last()
            .copied()
            .unwrap_or(ProvisioningState::Received)
    }

    pub fn advance(&mut self, next: ProvisioningState) -> Result<(), WardenError> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(WardenError::Internal(format!(
                "illegal lifecycle transition {} -> {}",
                current, next
            )));
        }
        debug!(from = %current, to = %next, "Lifecycle transition");
        self.trace.push(next);
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.current().is_terminal()
    }

    pub fn trace(&self) -> &[ProvisioningState] {
        &self.trace
    }

    pub fn into_trace(self) -> Vec<ProvisioningState> {
        self.trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProvisioningState::*;

    #[test]
    fn test_happy_path() {
        let mut tracker = LifecycleTracker::new();
        for state in [ValidatingPrincipal, Scoping, Applying, Applied] {
            tracker.advance(state).unwrap();
        }
        assert!(tracker.is_terminal());
        assert_eq!(
            tracker.trace(),
            &[Received, ValidatingPrincipal, Scoping, Applying, Applied]
        );
    }

    #[test]
    fn test_terminal_state_is_final() {
        let mut tracker = LifecycleTracker::new();
        tracker.advance(ApprovalRequired).unwrap();
        assert!(tracker.advance(ValidatingPrincipal).is_err());
        assert_eq!(tracker.current(), ApprovalRequired);
    }

    #[test]
    fn test_skipping_states_is_rejected() {
        let mut tracker = LifecycleTracker::new();
        let err = tracker.advance(Applying).unwrap_err();
        assert!(matches!(err, WardenError::Internal(_)));
        assert_eq!(tracker.trace(), &[Received]);
    }
}
