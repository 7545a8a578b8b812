//! Status, removal, cluster registry, and metrics operations

mod common;

use common::*;
use warden_observability::{export_metrics, AuditAction, AuditOutcome};
use warden_provisioner::{Condition, ConditionSeverity, ConditionStatus, InMemoryControlPlane, RequestContext};
use warden_types::{
    AssignmentPhase, CallerIdentity, ClusterConfiguration, Environment, ErrorCode,
    ProvisioningStatus, ProvisioningStep, RemoveRequest, StatusRequest,
};

fn status_request(namespace: &str) -> StatusRequest {
    StatusRequest {
        namespace: namespace.to_string(),
        cluster_name: None,
    }
}

fn remove_request(namespace: &str) -> RemoveRequest {
    RemoveRequest {
        namespace: namespace.to_string(),
        cluster_name: None,
    }
}

fn admin() -> CallerIdentity {
    CallerIdentity::new("platform-ops").as_platform_admin()
}

#[tokio::test]
async fn test_status_lists_applied_assignments() {
    let h = Harness::new().await;
    for role in ["writer", "reader"] {
        let mut request = dev_request("payments");
        request.role_key = role.to_string();
        h.provisioner
            .submit(&caller(), request, RequestContext::new())
            .await;
    }
    h.provisioner
        .submit(&caller(), dev_request("billing"), RequestContext::new())
        .await;

    let report = h
        .provisioner
        .status(&caller(), status_request("payments"), RequestContext::new())
        .await
        .unwrap();

    assert_eq!(report.cluster_name, "dev-cluster");
    let names: Vec<&str> = report.assignments.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["payments-frontend-reader-0", "payments-frontend-writer-0"]
    );
    for assignment in &report.assignments {
        assert_eq!(assignment.phase, AssignmentPhase::Succeeded);
        assert!(assignment.scope.as_str().ends_with("/namespaces/payments"));
        assert_eq!(assignment.principal_id.as_str(), ALICE);
    }
}

#[tokio::test]
async fn test_status_reflects_reconciliation() {
    let h = Harness::build(config(), InMemoryControlPlane::deferred()).await;
    h.provisioner
        .submit(&caller(), dev_request("payments"), RequestContext::new())
        .await;

    let phase = |report: &warden_types::StatusReport| report.assignments[0].phase;

    let report = h
        .provisioner
        .status(&caller(), status_request("payments"), RequestContext::new())
        .await
        .unwrap();
    assert_eq!(phase(&report), AssignmentPhase::Pending);

    h.control_plane.inner().set_condition(
        RESOURCE_NAMESPACE,
        "payments-frontend-reader-0",
        Condition::ready(ConditionStatus::False)
            .with_severity(ConditionSeverity::Error)
            .with_reason("PrincipalNotFound"),
    );
    let report = h
        .provisioner
        .status(&caller(), status_request("payments"), RequestContext::new())
        .await
        .unwrap();
    assert_eq!(phase(&report), AssignmentPhase::Failed);
}

#[tokio::test]
async fn test_status_of_malformed_namespace_is_rejected() {
    let h = Harness::new().await;

    let report = h
        .provisioner
        .status(&caller(), status_request("-payments"), RequestContext::new())
        .await
        .unwrap_err();

    assert_eq!(report.code, ErrorCode::ValidationError);
    assert_eq!(report.step, ProvisioningStep::Intake);
    assert_eq!(h.control_plane.calls(), 0);
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let h = Harness::new().await;
    for role in ["reader", "writer"] {
        let mut request = dev_request("payments");
        request.role_key = role.to_string();
        h.provisioner
            .submit(&caller(), request, RequestContext::new())
            .await;
    }
    h.provisioner
        .submit(&caller(), dev_request("billing"), RequestContext::new())
        .await;

    let ack = h
        .provisioner
        .remove(&caller(), remove_request("payments"), RequestContext::new())
        .await
        .unwrap();
    assert_eq!(ack.removed, 2);
    assert_eq!(ack.cluster_name, "dev-cluster");

    let again = h
        .provisioner
        .remove(&caller(), remove_request("payments"), RequestContext::new())
        .await
        .unwrap();
    assert_eq!(again.removed, 0);

    let report = h
        .provisioner
        .status(&caller(), status_request("payments"), RequestContext::new())
        .await
        .unwrap();
    assert!(report.assignments.is_empty());
    assert_eq!(h.control_plane.inner().len(), 1, "other namespaces untouched");

    let events = h.audit_events().await;
    let removals = events
        .iter()
        .filter(|e| e.action == AuditAction::GrantsRemoved)
        .count();
    assert_eq!(removals, 2);
}

#[tokio::test]
async fn test_grant_can_be_reissued_after_removal() {
    let h = Harness::new().await;
    h.provisioner
        .submit(&caller(), dev_request("payments"), RequestContext::new())
        .await;
    h.provisioner
        .remove(&caller(), remove_request("payments"), RequestContext::new())
        .await
        .unwrap();

    let result = h
        .provisioner
        .submit(&caller(), dev_request("payments"), RequestContext::new())
        .await;
    assert_eq!(result.status, ProvisioningStatus::Created);
    assert_eq!(result.message, "role assignment created");
}

#[tokio::test]
async fn test_list_clusters_returns_summaries() {
    let h = Harness::new().await;

    let list = h
        .provisioner
        .list_clusters(&caller(), RequestContext::new())
        .await
        .unwrap();

    let mut names: Vec<&str> = list.clusters.iter().map(|c| c.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["dev-cluster", "prod-cluster"]);
    let default = list.clusters.iter().find(|c| c.is_default).unwrap();
    assert_eq!(default.name, "dev-cluster");

    let json = serde_json::to_value(&list).unwrap();
    assert!(json["clusters"][0].get("isDefault").is_some());
}

#[tokio::test]
async fn test_cluster_mutations_require_platform_admin() {
    let h = Harness::new().await;
    let staging: ClusterConfiguration = seed("stage-cluster", Environment::Staging, false).into();

    let report = h
        .provisioner
        .register_cluster(&caller(), staging.clone(), RequestContext::new())
        .await
        .unwrap_err();
    assert_eq!(report.code, ErrorCode::Unauthorized);
    assert_eq!(report.step, ProvisioningStep::Registry);

    h.provisioner
        .register_cluster(&admin(), staging, RequestContext::new())
        .await
        .unwrap();
    assert_eq!(h.provisioner.registry().list().len(), 3);

    let mut request = dev_request("payments");
    request.environment = "staging".to_string();
    request.cluster_name = Some("stage-cluster".to_string());
    let result = h
        .provisioner
        .submit(&caller(), request, RequestContext::new())
        .await;
    assert_eq!(result.status, ProvisioningStatus::Created);

    let removed = h
        .provisioner
        .deregister_cluster(&admin(), "stage-cluster", RequestContext::new())
        .await
        .unwrap();
    assert_eq!(removed.name, "stage-cluster");

    let events = h.audit_events().await;
    let registered: Vec<_> = events
        .iter()
        .filter(|e| e.action == AuditAction::ClusterRegistered)
        .collect();
    assert_eq!(registered.len(), 2);
    assert!(matches!(registered[0].outcome, AuditOutcome::Failure { .. }));
    assert_eq!(registered[1].outcome, AuditOutcome::Success);
    assert!(events.iter().any(|e| e.action == AuditAction::ClusterRemoved));
}

#[tokio::test]
async fn test_second_default_cluster_is_rejected() {
    let h = Harness::new().await;
    let another_default: ClusterConfiguration =
        seed("dev-cluster-2", Environment::Development, true).into();

    assert!(h
        .provisioner
        .register_cluster(&admin(), another_default, RequestContext::new())
        .await
        .is_err());
    assert_eq!(h.provisioner.registry().list().len(), 2);
}

#[tokio::test]
async fn test_metrics_record_outcomes() {
    let h = Harness::new().await;
    h.provisioner
        .submit(&caller(), dev_request("payments"), RequestContext::new())
        .await;
    h.provisioner
        .submit(&caller(), prod_admin_request(), RequestContext::new())
        .await;
    h.audit_events().await;
    h.provisioner.breaker_health();

    let text = export_metrics(&h.metrics_registry).unwrap();
    assert!(text.contains("warden_requests_total"));
    assert!(text.contains("created"));
    assert!(text.contains("pending-approval"));
    assert!(text.contains("warden_audit_events_total"));
}

#[tokio::test]
async fn test_shutdown_drains_audit_queue() {
    let h = Harness::new().await;
    h.provisioner
        .submit(&caller(), dev_request("payments"), RequestContext::new())
        .await;

    h.provisioner.shutdown().await;
    assert_eq!(h.sink.len(), 1);
}
