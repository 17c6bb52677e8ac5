//! Per-run summary combining reconciliation and verification.

use super::plan::{Action, ActionKind, ActionStatus, ReconcileOutcome};
use super::verifier::{Verification, VerificationResult};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub skipped: usize,
    /// Store actions that were attempted and failed.
    pub failed: usize,
    pub verified: usize,
    pub degraded: usize,
    pub verification_failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerLine {
    pub name: String,
    pub action: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerLine {
    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
            && !matches!(
                self.verification,
                Some(Verification::Degraded(_) | Verification::Failed(_))
            )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub owner: String,
    pub counts: ReportCounts,
    pub workers: Vec<WorkerLine>,
    pub verification_skipped: bool,
}

impl Report {
    /// The line for the worker that remains under `name`. A deleted
    /// duplicate only matches when nothing else carries the name.
    pub fn line_for(&self, name: &str) -> Option<&WorkerLine> {
        let mut lines = self.workers.iter().filter(|line| line.name == name);
        let first = lines.next()?;
        if first.action != ActionKind::Delete {
            return Some(first);
        }
        lines.find(|line| line.action != ActionKind::Delete).or(Some(first))
    }

    /// True when every action applied and every verified worker produced output.
    pub fn is_clean(&self) -> bool {
        self.workers.iter().all(WorkerLine::is_healthy)
    }
}

/// Build the run report. Lines follow apply order, then unchanged workers,
/// then workers skipped during planning.
pub fn summarize(outcome: &ReconcileOutcome, verifications: &[VerificationResult]) -> Report {
    let verification_of = |name: &str| {
        verifications
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.outcome.clone())
    };
    let live_schedule = |name: &str| {
        outcome
            .converged
            .iter()
            .find(|w| w.name == name)
            .map(|w| w.schedule.clone())
    };

    let mut counts = ReportCounts::default();
    let mut workers = Vec::new();

    for applied in &outcome.outcomes {
        let name = applied.action.worker_name();
        let error = match &applied.status {
            ActionStatus::Applied => None,
            ActionStatus::Failed(reason) => Some(reason.clone()),
        };
        if error.is_some() {
            counts.failed += 1;
        } else {
            match applied.action.kind() {
                ActionKind::Create => counts.created += 1,
                ActionKind::Update => counts.updated += 1,
                ActionKind::Delete => counts.deleted += 1,
                ActionKind::Unchanged | ActionKind::Skipped => {}
            }
        }
        let (schedule, verification) = match &applied.action {
            Action::Create { spec } | Action::Update { spec, .. } => {
                let schedule = if error.is_some() {
                    live_schedule(name)
                } else {
                    Some(spec.schedule.clone())
                };
                (schedule, verification_of(name))
            }
            Action::Delete { .. } => (None, None),
        };
        workers.push(WorkerLine {
            name: name.to_string(),
            action: applied.action.kind(),
            schedule,
            verification,
            error,
        });
    }

    for name in &outcome.plan.unchanged {
        counts.unchanged += 1;
        workers.push(WorkerLine {
            name: name.clone(),
            action: ActionKind::Unchanged,
            schedule: live_schedule(name),
            verification: verification_of(name),
            error: None,
        });
    }

    for skipped in &outcome.plan.errors {
        counts.skipped += 1;
        workers.push(WorkerLine {
            name: skipped.name.clone(),
            action: ActionKind::Skipped,
            schedule: live_schedule(&skipped.name),
            verification: verification_of(&skipped.name),
            error: Some(skipped.message.clone()),
        });
    }

    for result in verifications {
        match result.outcome {
            Verification::Verified => counts.verified += 1,
            Verification::Degraded(_) => counts.degraded += 1,
            Verification::Failed(_) => counts.verification_failed += 1,
        }
    }

    Report {
        owner: outcome.plan.owner.clone(),
        counts,
        workers,
        verification_skipped: false,
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counts;
        writeln!(f, "Fleet report for {}", self.owner)?;
        writeln!(
            f,
            "  {} created, {} updated, {} deleted, {} unchanged, {} skipped, {} failed",
            c.created, c.updated, c.deleted, c.unchanged, c.skipped, c.failed
        )?;
        if self.verification_skipped {
            writeln!(f, "  verification skipped")?;
        } else {
            writeln!(
                f,
                "  {} verified, {} degraded, {} verification failures",
                c.verified, c.degraded, c.verification_failed
            )?;
        }
        for line in &self.workers {
            write!(f, "  {:<10} {}", line.action.to_string(), line.name)?;
            if let Some(schedule) = &line.schedule {
                write!(f, " [{schedule}]")?;
            }
            if let Some(verification) = &line.verification {
                write!(f, " {}", verification.label())?;
                if let Some(reason) = verification.reason() {
                    write!(f, " ({reason})")?;
                }
            }
            if let Some(error) = &line.error {
                write!(f, " error: {error}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
