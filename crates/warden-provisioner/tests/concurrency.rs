//! Concurrent submits against shared breakers and the control-plane

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use tokio::sync::Semaphore;
use warden_provisioner::{ControlPlaneError, CONTROL_PLANE_DEPENDENCY, RequestContext};
use warden_resilience::CircuitState;
use warden_types::{ErrorCode, ProvisioningStatus, ProvisioningStep};

#[tokio::test]
async fn test_concurrent_identical_submits_store_one_grant() {
    let h = Harness::new().await;
    let gate = Arc::new(Semaphore::new(0));
    h.control_plane.set_mode(ControlPlaneMode::Gated(gate.clone()));

    let release = async {
        // Both creates are parked at the control-plane before either answers.
        while h.control_plane.calls() < 2 {
            tokio::task::yield_now().await;
        }
        gate.add_permits(2);
    };

    let first_caller = caller();
    let second_caller = caller();
    let (first, second, ()) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(
            h.provisioner
                .submit(&first_caller, dev_request("payments"), RequestContext::new()),
            h.provisioner
                .submit(&second_caller, dev_request("payments"), RequestContext::new()),
            release,
        )
    })
    .await
    .expect("submits finished");

    assert_eq!(first.status, ProvisioningStatus::Created, "{}", first.message);
    assert_eq!(second.status, ProvisioningStatus::Created, "{}", second.message);
    assert_eq!(first.assignment_ids, second.assignment_ids);

    let mut messages = vec![first.message.as_str(), second.message.as_str()];
    messages.sort_unstable();
    assert_eq!(
        messages,
        vec!["role assignment created", "role assignment unchanged"]
    );
    assert_eq!(h.control_plane.inner().len(), 1);
}

#[tokio::test]
async fn test_half_open_admits_one_concurrent_probe() {
    let h = Harness::new().await;
    h.control_plane
        .set_mode(ControlPlaneMode::Fail(ControlPlaneError::Unavailable {
            status: 503,
            message: "service unavailable".into(),
        }));
    for namespace in ["team-a", "team-b", "team-c"] {
        h.provisioner
            .submit(&caller(), dev_request(namespace), RequestContext::new())
            .await;
    }
    assert_eq!(breaker_state(&h, CONTROL_PLANE_DEPENDENCY).0, CircuitState::Open);
    let creates_before = h.control_plane.creates();

    let gate = Arc::new(Semaphore::new(0));
    h.control_plane.set_mode(ControlPlaneMode::Gated(gate.clone()));
    h.clock.advance(Duration::from_secs(31));

    let finished = AtomicUsize::new(0);
    let submit = |namespace: &'static str| {
        let h = &h;
        let finished = &finished;
        async move {
            let result = h
                .provisioner
                .submit(&caller(), dev_request(namespace), RequestContext::new())
                .await;
            finished.fetch_add(1, Ordering::SeqCst);
            result
        }
    };
    let release = async {
        // The probe stays parked until the other two have failed fast.
        while finished.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        gate.add_permits(1);
    };

    let (x, y, z, ()) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(submit("team-x"), submit("team-y"), submit("team-z"), release)
    })
    .await
    .expect("submits finished");

    let results = [x, y, z];
    let created = results
        .iter()
        .filter(|r| r.status == ProvisioningStatus::Created)
        .count();
    assert_eq!(created, 1);

    for result in results.iter().filter(|r| r.status != ProvisioningStatus::Created) {
        let failure = result.failure.as_ref().unwrap();
        assert_eq!(failure.code, ErrorCode::DependencyUnavailable);
        assert_eq!(failure.step, ProvisioningStep::Apply);
    }

    assert_eq!(h.control_plane.creates(), creates_before + 1);
    assert_eq!(
        breaker_state(&h, CONTROL_PLANE_DEPENDENCY),
        (CircuitState::Closed, 0)
    );
}
