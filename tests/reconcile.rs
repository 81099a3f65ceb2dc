// ABOUTME: Integration tests for the reconciliation pass.
// ABOUTME: Crash leftovers are failed; in-flight deployments are left alone.

mod support;

use keel::deploy::Attempt;
use keel::model::{Deployment, DeploymentStatus, ServiceStatus};
use keel::store::Store;
use support::fake_runtime::FakeRuntime;
use support::fixtures::World;

async fn stuck(world: &World, slug: &str) -> keel::model::Service {
    let mut svc = world.service(slug, Some("nginx:latest"));
    svc.status = ServiceStatus::Deploying;
    world.update(&svc);
    svc
}

#[tokio::test]
async fn fails_orphaned_deployments_and_repairs_services() {
    support::init_tracing();
    let world = World::new();

    let orphaned = stuck(&world, "orphaned").await;
    let pending = Deployment::pending(orphaned.id, None);
    world.store.create_deployment(&pending).await.unwrap();

    let finished = stuck(&world, "finished").await;
    let success = Attempt::new(finished.id, None)
        .begin()
        .unwrap()
        .succeed()
        .unwrap()
        .into_record();
    world.store.create_deployment(&success).await.unwrap();

    let untouched = world.service("untouched", Some("nginx:latest"));

    let orch = world.orchestrator(FakeRuntime::single_host());
    let report = orch.reconcile().await.unwrap();

    assert_eq!(report.interrupted, vec![pending.id]);
    let mut repaired = report.repaired.clone();
    repaired.sort();
    let mut expected = vec![orphaned.id, finished.id];
    expected.sort();
    assert_eq!(repaired, expected);

    let record = world.store.get_deployment(pending.id).await.unwrap();
    assert_eq!(record.status, DeploymentStatus::Failed);
    assert!(record.finished_at.is_some());
    assert!(record.logs.unwrap().contains("interrupted"));

    let status = |id| {
        let store = std::sync::Arc::clone(&world.store);
        async move { store.get_service(id).await.unwrap().status }
    };
    assert_eq!(status(orphaned.id).await, ServiceStatus::Failed);
    assert_eq!(status(finished.id).await, ServiceStatus::Running);
    assert_eq!(status(untouched.id).await, ServiceStatus::Stopped);

    // Nothing left to do.
    assert!(orch.reconcile().await.unwrap().is_empty());
}

#[tokio::test]
async fn in_flight_deployment_is_skipped() {
    let world = World::new();
    let svc = world.service("web", Some("nginx:latest"));
    let (runtime, gate) = FakeRuntime::single_host().with_pull_gate();
    let orch = world.orchestrator(runtime);

    let (_, task) = orch.deploy(world.member, svc.id).await.unwrap();
    let mut rx = task.subscribe();
    rx.wait_for(|s| *s == DeploymentStatus::Deploying)
        .await
        .unwrap();

    let report = orch.reconcile().await.unwrap();
    assert!(report.is_empty(), "{report:?}");

    gate.notify_one();
    assert_eq!(task.wait().await.unwrap().status, DeploymentStatus::Success);
    assert_eq!(
        world.store.get_service(svc.id).await.unwrap().status,
        ServiceStatus::Running
    );
}
