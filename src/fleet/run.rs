use super::catalog::Catalog;
use super::inspector::ManagedNamespace;
use super::plan::{ConvergencePlan, ReconcileOutcome};
use super::reconciler::Reconciler;
use super::report::{Report, summarize};
use super::verifier::{ActivationVerifier, VerifyOptions};
use crate::error::Result;
use crate::platform::WorkerPlatform;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub verify: VerifyOptions,
    pub skip_verify: bool,
}

/// Reconcile one owner's managed fleet against `catalog`, then verify every
/// converged worker. Store failures and verification outcomes end up in the
/// report; only a failed inspection aborts the run.
pub async fn run(
    platform: Arc<dyn WorkerPlatform>,
    owner: &str,
    catalog: &Catalog,
    namespace: &ManagedNamespace,
    options: RunOptions,
    cancel: &CancellationToken,
) -> Result<Report> {
    let outcome = Reconciler::new(platform.as_ref(), namespace)
        .reconcile(owner, catalog)
        .await?;
    Ok(finish(platform, owner, &outcome, options, cancel).await)
}

/// Same as [`run`], but only applies `approved`, the plan the operator
/// reviewed. If the live fleet moved in the meantime nothing is written and
/// `FleetError::PlanChanged` is returned.
pub async fn run_approved(
    platform: Arc<dyn WorkerPlatform>,
    owner: &str,
    catalog: &Catalog,
    namespace: &ManagedNamespace,
    approved: &ConvergencePlan,
    options: RunOptions,
    cancel: &CancellationToken,
) -> Result<Report> {
    let outcome = Reconciler::new(platform.as_ref(), namespace)
        .reconcile_approved(owner, catalog, approved)
        .await?;
    Ok(finish(platform, owner, &outcome, options, cancel).await)
}

async fn finish(
    platform: Arc<dyn WorkerPlatform>,
    owner: &str,
    outcome: &ReconcileOutcome,
    options: RunOptions,
    cancel: &CancellationToken,
) -> Report {
    if options.skip_verify {
        let mut report = summarize(outcome, &[]);
        report.verification_skipped = true;
        return report;
    }

    tracing::info!(
        owner,
        workers = outcome.converged.len(),
        concurrency = options.verify.concurrency,
        "verifying converged workers"
    );
    let results = ActivationVerifier::new(platform, options.verify)
        .verify(&outcome.converged, cancel)
        .await;

    summarize(outcome, &results)
}

/// Compute the plan without mutating anything.
pub async fn dry_run(
    platform: &dyn WorkerPlatform,
    owner: &str,
    catalog: &Catalog,
    namespace: &ManagedNamespace,
) -> Result<ConvergencePlan> {
    Ok(Reconciler::new(platform, namespace)
        .plan(owner, catalog)
        .await?)
}
