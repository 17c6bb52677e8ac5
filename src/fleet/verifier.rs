//! Force one run of every converged worker and watch for new output.
//!
//! Workers are verified independently on a bounded pool. Tasks share only the
//! immutable target list and a single mutex-guarded result table.

use crate::config::VerificationConfig;
use crate::platform::{LiveWorker, WorkerPlatform};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const NO_OUTPUT_REASON: &str = "no output observed";
pub const CANCELLED_REASON: &str = "verification cancelled";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Verification {
    /// Output count increased after the forced run.
    Verified,
    /// The run was requested but nothing was observed in time.
    Degraded(String),
    /// The forced run could not be requested.
    Failed(String),
}

impl Verification {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Degraded(_) => "degraded",
            Self::Failed(_) => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Verified => None,
            Self::Degraded(reason) | Self::Failed(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub worker_id: String,
    pub name: String,
    pub outcome: Verification,
    pub output_delta: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Maximum workers verified at once.
    pub concurrency: usize,
}

impl From<&VerificationConfig> for VerifyOptions {
    fn from(config: &VerificationConfig) -> Self {
        Self {
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            concurrency: config.concurrency,
        }
    }
}

pub struct ActivationVerifier {
    platform: Arc<dyn WorkerPlatform>,
    options: VerifyOptions,
}

impl ActivationVerifier {
    pub fn new(platform: Arc<dyn WorkerPlatform>, options: VerifyOptions) -> Self {
        Self { platform, options }
    }

    /// One result per worker, in input order. Cancelling `cancel` stops
    /// in-flight polls; workers that had not been classified yet come back
    /// as degraded.
    pub async fn verify(
        &self,
        workers: &[LiveWorker],
        cancel: &CancellationToken,
    ) -> Vec<VerificationResult> {
        let targets: Arc<Vec<LiveWorker>> = Arc::new(workers.to_vec());
        let results: Arc<Mutex<Vec<Option<VerificationResult>>>> =
            Arc::new(Mutex::new(vec![None; targets.len()]));
        let pool = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for index in 0..targets.len() {
            let targets = Arc::clone(&targets);
            let results = Arc::clone(&results);
            let pool = Arc::clone(&pool);
            let platform = Arc::clone(&self.platform);
            let cancel = cancel.clone();
            let options = self.options;

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    () = cancel.cancelled() => return,
                    permit = pool.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };
                let worker = &targets[index];
                let result = verify_one(platform.as_ref(), worker, options, &cancel).await;
                results.lock().await[index] = Some(result);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "verification task ended abnormally");
            }
        }

        let slots = std::mem::take(&mut *results.lock().await);
        slots
            .into_iter()
            .zip(targets.iter())
            .map(|(slot, worker)| {
                slot.unwrap_or_else(|| VerificationResult {
                    worker_id: worker.id.clone(),
                    name: worker.name.clone(),
                    outcome: if cancel.is_cancelled() {
                        Verification::Degraded(CANCELLED_REASON.into())
                    } else {
                        Verification::Failed("verification task aborted".into())
                    },
                    output_delta: 0,
                })
            })
            .collect()
    }
}

async fn verify_one(
    platform: &dyn WorkerPlatform,
    worker: &LiveWorker,
    options: VerifyOptions,
    cancel: &CancellationToken,
) -> VerificationResult {
    let classify = |outcome: Verification, output_delta: u64| VerificationResult {
        worker_id: worker.id.clone(),
        name: worker.name.clone(),
        outcome,
        output_delta,
    };

    let cancelled = || classify(Verification::Degraded(CANCELLED_REASON.into()), 0);

    let Some(listed) = cancel
        .run_until_cancelled(platform.output_count(&worker.id))
        .await
    else {
        return cancelled();
    };
    let baseline = match listed {
        Ok(count) => count,
        Err(e) => {
            tracing::debug!(worker = %worker.name, error = %e, "using listed output count as baseline");
            worker.output_count
        }
    };

    let Some(requested) = cancel
        .run_until_cancelled(platform.force_execute(&worker.id))
        .await
    else {
        return cancelled();
    };
    if let Err(e) = requested {
        tracing::warn!(worker = %worker.name, error = %e, "forced execution request failed");
        return classify(Verification::Failed(e.cause), 0);
    }

    let deadline = Instant::now() + options.timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let wait = options.poll_interval.min(remaining);

        let polled = tokio::select! {
            () = cancel.cancelled() => return cancelled(),
            polled = async {
                tokio::time::sleep(wait).await;
                platform.output_count(&worker.id).await
            } => polled,
        };

        match polled {
            Ok(count) if count > baseline => {
                tracing::info!(worker = %worker.name, delta = count - baseline, "worker verified");
                return classify(Verification::Verified, count - baseline);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(worker = %worker.name, error = %e, "output poll failed; retrying");
            }
        }

        if Instant::now() >= deadline {
            let reason = if worker.disabled {
                format!("{NO_OUTPUT_REASON} (worker is disabled)")
            } else {
                NO_OUTPUT_REASON.to_string()
            };
            tracing::warn!(worker = %worker.name, timeout_ms = options.timeout.as_millis() as u64, "no output observed before timeout");
            return classify(Verification::Degraded(reason), 0);
        }
    }
}
