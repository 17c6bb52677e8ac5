//! Declarative fleet management: a catalog of desired workers is reconciled
//! against the live platform and every converged worker is verified by a
//! forced run.

pub mod catalog;
pub mod inspector;
pub mod plan;
pub mod reconciler;
pub mod report;
pub mod run;
pub mod schedule;
pub mod verifier;

pub use catalog::{Catalog, DEFAULT_RETENTION_SECONDS, WorkerSpec};
pub use inspector::{FleetInspector, FleetSnapshot, ManagedNamespace};
pub use plan::{Action, ActionKind, ActionStatus, ConvergencePlan, Drift, ReconcileOutcome};
pub use reconciler::{Reconciler, diff};
pub use report::{Report, ReportCounts, WorkerLine, summarize};
pub use run::{RunOptions, dry_run, run, run_approved};
pub use verifier::{ActivationVerifier, Verification, VerificationResult, VerifyOptions};
