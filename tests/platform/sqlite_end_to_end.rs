use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use fleetsync::fleet::{self, FleetInspector};
use fleetsync::platform::{NewWorker, SqlitePlatform, WorkerPlatform};

use crate::fleet_harness::{OWNER, demo_catalog, fast_options, namespace};

fn new_worker(name: &str, schedule: &str) -> NewWorker {
    NewWorker {
        name: name.into(),
        schedule: schedule.into(),
        code_body: "Agent.createEvent({ legacy: true });".into(),
        retention_seconds: 604_800,
        language: "javascript".into(),
    }
}

async fn open(dir: &TempDir) -> Arc<SqlitePlatform> {
    let path = dir.path().join("host.db");
    let platform = SqlitePlatform::connect(path.to_str().unwrap(), 2)
        .await
        .unwrap();
    platform.ensure_user(OWNER).await.unwrap();
    Arc::new(platform)
}

/// Stand-in for the host's job runner: every forced run yields one event.
fn spawn_engine(platform: Arc<SqlitePlatform>, stop: CancellationToken) {
    tokio::spawn(async move {
        while !stop.is_cancelled() {
            for agent in platform.claim_check_requests().await.unwrap_or_default() {
                let _ = platform
                    .record_event(&agent, &serde_json::json!({ "forced": true }))
                    .await;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });
}

#[tokio::test]
async fn demo_fleet_converges_against_host_database() {
    let dir = TempDir::new().unwrap();
    let platform = open(&dir).await;
    platform
        .create_worker(OWNER, &new_worker("Matt 2.0 Market Intelligence", "every_1h"))
        .await
        .unwrap();
    platform
        .create_worker(OWNER, &new_worker("Matt 2.0 Retired", "every_3m"))
        .await
        .unwrap();
    let xkcd = platform
        .create_worker(OWNER, &new_worker("XKCD Source", "every_1d"))
        .await
        .unwrap();

    let engine_stop = CancellationToken::new();
    spawn_engine(platform.clone(), engine_stop.clone());

    let desired = demo_catalog();
    let report = fleet::run(
        platform.clone(),
        OWNER,
        &desired,
        &namespace(),
        fast_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    engine_stop.cancel();

    assert_eq!(report.counts.deleted, 1);
    assert_eq!(report.counts.created, 2);
    assert_eq!(report.counts.updated, 1);
    assert_eq!(report.counts.verified, 3, "{report}");

    let snapshot = FleetInspector::new(platform.as_ref(), &namespace())
        .snapshot(OWNER)
        .await
        .unwrap();
    assert_eq!(snapshot.managed.len(), 3);
    assert_eq!(snapshot.foreign, vec![xkcd]);
    assert!(snapshot.managed.iter().all(|w| w.output_count == 1));

    let plan = fleet::dry_run(platform.as_ref(), OWNER, &desired, &namespace())
        .await
        .unwrap();
    assert!(plan.is_empty(), "{plan}");
}

#[tokio::test]
async fn without_a_job_runner_verification_degrades() {
    let dir = TempDir::new().unwrap();
    let platform = open(&dir).await;

    let report = fleet::run(
        platform.clone(),
        OWNER,
        &demo_catalog(),
        &namespace(),
        fast_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.counts.created, 3);
    assert_eq!(report.counts.degraded, 3);
    for worker in platform.list_workers(OWNER, 1).await.unwrap().workers {
        assert_eq!(platform.pending_checks(&worker.id).await.unwrap(), 1);
    }
}

#[tokio::test]
async fn unknown_owner_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let platform = open(&dir).await;

    let err = fleet::run(
        platform,
        "someone@example.com",
        &demo_catalog(),
        &namespace(),
        fast_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("someone@example.com"));
}
