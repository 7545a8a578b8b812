//! End-to-end provisioning scenarios

mod common;

use common::*;
use warden_provisioner::RequestContext;
use warden_observability::{AuditAction, AuditOutcome, AuditSeverity};
use warden_resilience::CircuitState;
use warden_types::{ErrorCode, ProvisioningState, ProvisioningStatus, ProvisioningStep};

#[tokio::test]
async fn test_approved_privileged_grant_is_created() {
    let h = Harness::new().await;

    let result = h
        .provisioner
        .submit(&caller(), prod_admin_request(), approval())
        .await;

    assert_eq!(result.status, ProvisioningStatus::Created, "{}", result.message);
    assert_eq!(result.assignment_ids, vec!["frontend-prod-frontend-admin-0".to_string()]);
    assert_eq!(result.state, ProvisioningState::Applied);
    assert_eq!(
        result.trace,
        vec![
            ProvisioningState::Received,
            ProvisioningState::ValidatingPrincipal,
            ProvisioningState::Scoping,
            ProvisioningState::Applying,
            ProvisioningState::Applied,
        ]
    );

    let grant = result.grant.expect("created result carries the grant");
    assert_eq!(grant.cluster_name, "prod-cluster");
    assert_eq!(grant.assignments.len(), 1);
    assert!(grant.assignments[0]
        .scope
        .as_str()
        .ends_with("/prod-cluster/namespaces/frontend-prod"));
    assert_eq!(h.control_plane.inner().len(), 1);

    let events = h.audit_events().await;
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.action, AuditAction::GrantProvisioned);
    assert_eq!(event.outcome, AuditOutcome::Success);
    assert_eq!(event.severity, AuditSeverity::High);
    assert_eq!(event.state, Some(ProvisioningState::Applied));
    assert_eq!(event.principal_masked.as_deref(), Some("0a4b****"));
    assert_eq!(event.correlation_id, result.correlation_id);
}

#[tokio::test]
async fn test_unknown_principal_never_reaches_applier() {
    let h = Harness::new().await;

    let mut request = prod_admin_request();
    request.principal_id = GHOST.to_string();
    let result = h.provisioner.submit(&caller(), request, approval()).await;

    assert_eq!(result.status, ProvisioningStatus::Failed);
    assert!(result.message.contains(GHOST), "{}", result.message);
    assert_eq!(result.state, ProvisioningState::ValidationFailed);
    assert_eq!(h.control_plane.calls(), 0);

    let failure = result.failure.expect("failed result carries a report");
    assert_eq!(failure.code, ErrorCode::PrincipalNotFound);
    assert_eq!(failure.step, ProvisioningStep::PrincipalValidation);
    assert!(!failure.is_retryable());

    let health = h.provisioner.breaker_health();
    let directory = health
        .iter()
        .find(|b| b.dependency == "identity-directory")
        .unwrap();
    assert_eq!(directory.state, CircuitState::Closed);
    assert_eq!(directory.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_apply_timeouts_open_the_breaker() {
    let h = Harness::new().await;
    h.control_plane.set_mode(ControlPlaneMode::Hang);

    for namespace in ["team-a", "team-b", "team-c"] {
        let result = h
            .provisioner
            .submit(&caller(), dev_request(namespace), RequestContext::new())
            .await;
        assert_eq!(result.status, ProvisioningStatus::Failed);
        assert_eq!(result.state, ProvisioningState::ApplyFailed);
        let failure = result.failure.unwrap();
        assert_eq!(failure.code, ErrorCode::DependencyUnavailable);
        assert_eq!(failure.step, ProvisioningStep::Apply);
    }
    assert_eq!(h.control_plane.creates(), 3);

    let result = h
        .provisioner
        .submit(&caller(), dev_request("team-d"), RequestContext::new())
        .await;

    assert_eq!(result.status, ProvisioningStatus::Failed);
    let failure = result.failure.unwrap();
    assert_eq!(failure.code, ErrorCode::DependencyUnavailable);
    assert!(failure.retry_after_ms.unwrap_or(0) > 0);
    assert_eq!(h.control_plane.creates(), 3, "open breaker must fail fast");

    let health = h.provisioner.breaker_health();
    let control_plane = health
        .iter()
        .find(|b| b.dependency == "control-plane")
        .unwrap();
    assert_eq!(control_plane.state, CircuitState::Open);
    assert!(control_plane.next_retry_at.is_some());
}

#[tokio::test]
async fn test_resubmitting_is_idempotent() {
    let h = Harness::new().await;

    let first = h
        .provisioner
        .submit(&caller(), dev_request("payments"), RequestContext::new())
        .await;
    let second = h
        .provisioner
        .submit(&caller(), dev_request("payments"), RequestContext::new())
        .await;

    assert_eq!(first.status, ProvisioningStatus::Created);
    assert_eq!(second.status, ProvisioningStatus::Created);
    assert_eq!(first.assignment_ids, second.assignment_ids);
    assert_eq!(second.message, "role assignment unchanged");
    assert_eq!(h.control_plane.inner().len(), 1);
}

#[tokio::test]
async fn test_different_role_keys_coexist() {
    let h = Harness::new().await;

    let reader = h
        .provisioner
        .submit(&caller(), dev_request("payments"), RequestContext::new())
        .await;
    let mut request = dev_request("payments");
    request.role_key = "writer".to_string();
    let writer = h
        .provisioner
        .submit(&caller(), request, RequestContext::new())
        .await;

    assert_eq!(reader.status, ProvisioningStatus::Created);
    assert_eq!(writer.status, ProvisioningStatus::Created);
    assert_ne!(reader.assignment_ids, writer.assignment_ids);
    assert_eq!(h.control_plane.inner().len(), 2);
}

#[tokio::test]
async fn test_same_name_for_another_principal_conflicts() {
    let h = Harness::new().await;

    h.provisioner
        .submit(&caller(), dev_request("payments"), RequestContext::new())
        .await;

    let mut request = dev_request("payments");
    request.principal_id = FRONTEND_GROUP.to_string();
    let result = h
        .provisioner
        .submit(&caller(), request, RequestContext::new())
        .await;

    assert_eq!(result.status, ProvisioningStatus::Failed);
    assert_eq!(result.state, ProvisioningState::ApplyFailed);
    let failure = result.failure.unwrap();
    assert_eq!(failure.code, ErrorCode::Conflict);
    assert!(!failure.is_retryable());
    assert_eq!(h.control_plane.inner().len(), 1);
}

#[tokio::test]
async fn test_missing_approval_stops_before_any_dependency() {
    let h = Harness::new().await;

    let result = h
        .provisioner
        .submit(&caller(), prod_admin_request(), RequestContext::new())
        .await;

    assert_eq!(result.status, ProvisioningStatus::PendingApproval);
    assert_eq!(result.state, ProvisioningState::ApprovalRequired);
    assert!(result.assignment_ids.is_empty());
    assert!(result.failure.is_none());
    assert_eq!(h.directory.calls(), 0);
    assert_eq!(h.control_plane.calls(), 0);

    let events = h.audit_events().await;
    assert!(matches!(events[0].outcome, AuditOutcome::Pending { .. }));
}

#[tokio::test]
async fn test_self_approval_is_denied() {
    let h = Harness::new().await;

    let ctx = RequestContext::new()
        .with_approval(warden_policy::ApprovalSignal::new(caller().id.as_str()));
    let result = h.provisioner.submit(&caller(), prod_admin_request(), ctx).await;

    assert_eq!(result.status, ProvisioningStatus::Failed);
    assert_eq!(result.state, ProvisioningState::PolicyDenied);
    assert_eq!(result.failure.unwrap().code, ErrorCode::PolicyDenied);
    assert_eq!(h.directory.calls(), 0);

    let events = h.audit_events().await;
    assert!(matches!(events[0].outcome, AuditOutcome::Denied { .. }));
    assert_eq!(events[0].severity, AuditSeverity::High);
}

#[tokio::test]
async fn test_malformed_fields_fail_at_intake() {
    let h = Harness::new().await;

    let bad_namespace = dev_request("Payments_NS");
    let mut bad_role = dev_request("payments");
    bad_role.role_key = "owner".to_string();
    let mut bad_environment = dev_request("payments");
    bad_environment.environment = "qa".to_string();

    for request in [bad_namespace, bad_role, bad_environment] {
        let result = h
            .provisioner
            .submit(&caller(), request, RequestContext::new())
            .await;
        assert_eq!(result.status, ProvisioningStatus::Failed);
        assert_eq!(
            result.trace,
            vec![ProvisioningState::Received, ProvisioningState::ValidationFailed]
        );
        let failure = result.failure.unwrap();
        assert_eq!(failure.code, ErrorCode::ValidationError);
        assert_eq!(failure.step, ProvisioningStep::Intake);
    }
    assert_eq!(h.directory.calls(), 0);
}

#[tokio::test]
async fn test_cluster_environment_mismatch_fails_scoping() {
    let h = Harness::new().await;

    let mut request = dev_request("payments");
    request.environment = "production".to_string();
    request.cluster_name = Some("dev-cluster".to_string());
    let result = h
        .provisioner
        .submit(&caller(), request, RequestContext::new())
        .await;

    assert_eq!(result.status, ProvisioningStatus::Failed);
    assert_eq!(result.state, ProvisioningState::ValidationFailed);
    assert!(result.trace.contains(&ProvisioningState::Scoping));
    assert_eq!(result.failure.unwrap().step, ProvisioningStep::Scoping);
    assert_eq!(h.control_plane.calls(), 0);
}

#[tokio::test]
async fn test_unknown_cluster_fails_scoping() {
    let h = Harness::new().await;

    let mut request = dev_request("payments");
    request.cluster_name = Some("nowhere".to_string());
    let result = h
        .provisioner
        .submit(&caller(), request, RequestContext::new())
        .await;

    assert_eq!(result.state, ProvisioningState::ValidationFailed);
    assert_eq!(result.failure.unwrap().step, ProvisioningStep::Scoping);
}

#[tokio::test]
async fn test_audit_never_records_raw_principal() {
    let h = Harness::new().await;

    let result = h
        .provisioner
        .submit(
            &caller(),
            dev_request("payments"),
            RequestContext::new().with_correlation_id("req-42"),
        )
        .await;
    assert_eq!(result.correlation_id.as_str(), "req-42");

    let events = h.audit_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].correlation_id.as_str(), "req-42");
    assert_eq!(events[0].principal_masked.as_deref(), Some("6f1c****"));
    assert_eq!(events[0].severity, AuditSeverity::Info);

    let serialized = serde_json::to_string(&events).unwrap();
    assert!(!serialized.contains(ALICE));
}
