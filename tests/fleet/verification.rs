use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use fleetsync::fleet::verifier::{CANCELLED_REASON, NO_OUTPUT_REASON};
use fleetsync::fleet::{self, ActivationVerifier, RunOptions, Verification, VerifyOptions};
use fleetsync::platform::memory::ExecutionBehavior;
use fleetsync::platform::{InMemoryPlatform, WorkerPlatform};

use crate::fleet_harness::{OWNER, catalog, fast_options, namespace, seed_spec, spec};

async fn seed_with_outputs(platform: &InMemoryPlatform, name: &str, outputs: u64) -> String {
    let id = seed_spec(platform, &spec(name, "every_5_minutes")).await;
    for _ in 0..outputs {
        platform.emit_output(&id).await.unwrap();
    }
    id
}

#[tokio::test]
async fn output_growth_from_five_to_six_is_verified() {
    let platform = Arc::new(InMemoryPlatform::new());
    let id = seed_with_outputs(&platform, "Matt 2.0 W", 5).await;
    platform
        .set_behavior(
            "Matt 2.0 W",
            ExecutionBehavior::Emit {
                after: Duration::from_millis(20),
            },
        )
        .await;

    let report = fleet::run(
        platform.clone(),
        OWNER,
        &catalog(vec![spec("Matt 2.0 W", "every_5_minutes")]),
        &namespace(),
        fast_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.counts.unchanged, 1);
    assert_eq!(
        report.line_for("Matt 2.0 W").unwrap().verification,
        Some(Verification::Verified)
    );
    assert_eq!(platform.output_count(&id).await.unwrap(), 6);
}

#[tokio::test]
async fn output_stuck_at_five_is_degraded() {
    let platform = Arc::new(InMemoryPlatform::new());
    let id = seed_with_outputs(&platform, "Matt 2.0 W", 5).await;
    platform
        .set_behavior("Matt 2.0 W", ExecutionBehavior::Silent)
        .await;

    let report = fleet::run(
        platform.clone(),
        OWNER,
        &catalog(vec![spec("Matt 2.0 W", "every_5_minutes")]),
        &namespace(),
        fast_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.counts.degraded, 1);
    assert_eq!(
        report.line_for("Matt 2.0 W").unwrap().verification,
        Some(Verification::Degraded(NO_OUTPUT_REASON.into()))
    );
    assert_eq!(platform.output_count(&id).await.unwrap(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn verification_time_is_bounded_by_pool_not_fleet_size() {
    let platform = Arc::new(InMemoryPlatform::new());
    let mut specs = Vec::new();
    for i in 0..6 {
        let name = format!("Matt 2.0 Silent {i}");
        platform.set_behavior(&name, ExecutionBehavior::Silent).await;
        specs.push(spec(&name, "never"));
    }
    let timeout = Duration::from_millis(250);
    let options = RunOptions {
        verify: VerifyOptions {
            timeout,
            poll_interval: Duration::from_millis(25),
            concurrency: 3,
        },
        skip_verify: false,
    };

    let started = Instant::now();
    let report = fleet::run(
        platform,
        OWNER,
        &catalog(specs),
        &namespace(),
        options,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.counts.degraded, 6);
    // Two waves of three; strictly sequential would take six timeouts.
    assert!(elapsed < timeout * 5, "verification took {elapsed:?}");
}

#[tokio::test]
async fn cancelled_run_still_reports_every_worker() {
    let platform = Arc::new(InMemoryPlatform::new());
    platform
        .set_behavior("Matt 2.0 Slow", ExecutionBehavior::Silent)
        .await;
    let options = RunOptions {
        verify: VerifyOptions {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(10),
            concurrency: 2,
        },
        skip_verify: false,
    };
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let report = fleet::run(
        platform,
        OWNER,
        &catalog(vec![
            spec("Matt 2.0 Fast", "every_1_minute"),
            spec("Matt 2.0 Slow", "every_1_minute"),
        ]),
        &namespace(),
        options,
        &cancel,
    )
    .await
    .unwrap();

    assert_eq!(report.counts.created, 2);
    assert_eq!(
        report.line_for("Matt 2.0 Fast").unwrap().verification,
        Some(Verification::Verified)
    );
    assert_eq!(
        report.line_for("Matt 2.0 Slow").unwrap().verification,
        Some(Verification::Degraded(CANCELLED_REASON.into()))
    );
}

#[tokio::test]
async fn rejected_forced_run_is_failed_not_degraded() {
    let platform = Arc::new(InMemoryPlatform::new());
    let id = seed_with_outputs(&platform, "Matt 2.0 Off", 0).await;
    platform
        .set_behavior(
            "Matt 2.0 Off",
            ExecutionBehavior::Reject("agent is disabled".into()),
        )
        .await;
    let worker = platform
        .snapshot(OWNER)
        .await
        .into_iter()
        .find(|w| w.id == id)
        .unwrap();

    let results = ActivationVerifier::new(platform, fast_options().verify)
        .verify(&[worker], &CancellationToken::new())
        .await;

    assert_eq!(
        results[0].outcome,
        Verification::Failed("agent is disabled".into())
    );
}
