use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use fleetsync::fleet::{self, ActionKind, Verification};
use fleetsync::platform::memory::PlatformCall;
use fleetsync::platform::InMemoryPlatform;

use crate::fleet_harness::{
    OWNER, catalog, demo_catalog, fast_options, namespace, seed_spec, spec,
};

#[tokio::test]
async fn legacy_schedule_is_repaired_and_verified() {
    let platform = Arc::new(InMemoryPlatform::new());
    let desired = spec("Matt 2.0 W1", "every_2_minutes");
    seed_spec(
        &platform,
        &fleetsync::fleet::WorkerSpec {
            schedule: "every_3m".into(),
            ..desired.clone()
        },
    )
    .await;

    let report = fleet::run(
        platform.clone(),
        OWNER,
        &catalog(vec![desired]),
        &namespace(),
        fast_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.counts.updated, 1);
    assert_eq!(report.counts.created + report.counts.deleted, 0);
    let line = report.line_for("Matt 2.0 W1").unwrap();
    assert_eq!(line.action, ActionKind::Update);
    assert_eq!(line.schedule.as_deref(), Some("every_2_minutes"));
    assert_eq!(line.verification, Some(Verification::Verified));
    assert_eq!(platform.snapshot(OWNER).await[0].schedule, "every_2_minutes");
}

#[tokio::test]
async fn stale_workers_are_replaced_and_foreign_ones_survive() {
    let platform = Arc::new(InMemoryPlatform::new());
    let keep = spec("Matt 2.0 A", "every_5_minutes");
    seed_spec(&platform, &keep).await;
    seed_spec(&platform, &spec("Matt 2.0 B", "every_5_minutes")).await;
    seed_spec(&platform, &spec("Matt 2.0 C", "every_5_minutes")).await;
    let xkcd = platform.seed(OWNER, "XKCD Source", "every_1d").await;

    let report = fleet::run(
        platform.clone(),
        OWNER,
        &catalog(vec![keep, spec("Matt 2.0 D", "every_10_minutes")]),
        &namespace(),
        fast_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.counts.deleted, 2);
    assert_eq!(report.counts.created, 1);
    assert_eq!(report.counts.unchanged, 1);
    assert_eq!(report.counts.verified, 2);

    let mut names: Vec<String> = platform
        .snapshot(OWNER)
        .await
        .into_iter()
        .map(|w| w.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Matt 2.0 A", "Matt 2.0 D", "XKCD Source"]);

    let foreign_calls = platform.calls().await.into_iter().filter(|call| match call {
        PlatformCall::Update { id } | PlatformCall::Delete { id } | PlatformCall::ForceExecute { id } => {
            id == &xkcd
        }
        _ => false,
    });
    assert_eq!(foreign_calls.count(), 0);
}

#[tokio::test]
async fn demo_catalog_converges_in_one_run() {
    let platform = Arc::new(InMemoryPlatform::new());
    let desired = demo_catalog();

    let first = fleet::run(
        platform.clone(),
        OWNER,
        &desired,
        &namespace(),
        fast_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(first.counts.created, 3);
    assert!(first.is_clean(), "{first}");

    let mutations = platform.mutation_count().await;
    let plan = fleet::dry_run(platform.as_ref(), OWNER, &desired, &namespace())
        .await
        .unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.unchanged.len(), 3);
    assert_eq!(platform.mutation_count().await, mutations);
}

#[tokio::test]
async fn unrecognized_schedule_is_reported_while_others_converge() {
    let platform = Arc::new(InMemoryPlatform::new());

    let report = fleet::run(
        platform.clone(),
        OWNER,
        &catalog(vec![
            spec("Matt 2.0 Odd", "twice_a_day"),
            spec("Matt 2.0 Fine", "every_1h"),
        ]),
        &namespace(),
        fast_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.counts.skipped, 1);
    assert_eq!(report.counts.created, 1);
    let odd = report.line_for("Matt 2.0 Odd").unwrap();
    assert_eq!(odd.action, ActionKind::Skipped);
    assert!(odd.error.as_deref().unwrap().contains("twice_a_day"));
    assert!(!report.is_clean());
}
