//! Diff the catalog against live managed workers and converge the store.
//!
//! Only this module mutates live state. Actions run one at a time per owner
//! in Delete → Create → Update order so a rename never collides with the name
//! it replaces.

use super::catalog::{Catalog, WorkerSpec};
use super::inspector::{FleetInspector, ManagedNamespace};
use super::plan::{Action, ActionOutcome, ActionStatus, ConvergencePlan, Drift, PlanError, ReconcileOutcome};
use super::schedule::normalize;
use crate::error::{FleetError, StoreAction, StoreError};
use crate::platform::{LiveWorker, NewWorker, WorkerPlatform, WorkerUpdate};
use std::collections::{HashMap, HashSet};

/// Compute the plan that turns `live` (managed workers only) into `catalog`.
///
/// When the store holds several workers under one name, the first listed is
/// matched and the rest are scheduled for deletion.
pub fn diff(owner: &str, catalog: &Catalog, live: &[LiveWorker]) -> ConvergencePlan {
    let mut by_name: HashMap<&str, &LiveWorker> = HashMap::new();
    let mut deletes = Vec::new();
    let wanted: HashSet<&str> = catalog.specs().iter().map(|s| s.name.as_str()).collect();

    for worker in live {
        if !wanted.contains(worker.name.as_str()) || by_name.contains_key(worker.name.as_str()) {
            deletes.push(Action::Delete {
                id: worker.id.clone(),
                name: worker.name.clone(),
            });
        } else {
            by_name.insert(&worker.name, worker);
        }
    }

    let mut creates = Vec::new();
    let mut updates = Vec::new();
    let mut unchanged = Vec::new();
    let mut errors = Vec::new();

    for spec in catalog.specs() {
        let normalized = match normalize(&spec.schedule) {
            Ok(normalized) => normalized,
            Err(error) => {
                tracing::warn!(worker = %spec.name, token = %error.token, "skipping worker with unrecognized schedule");
                errors.push(PlanError {
                    name: spec.name.clone(),
                    message: error.to_string(),
                    error,
                });
                continue;
            }
        };
        let target = WorkerSpec {
            schedule: normalized.canonical.to_string(),
            ..spec.clone()
        };

        match by_name.get(spec.name.as_str()) {
            None => creates.push(Action::Create { spec: target }),
            Some(existing) => {
                let changes = drift(existing, &target);
                if changes.is_empty() {
                    unchanged.push(spec.name.clone());
                } else {
                    updates.push(Action::Update {
                        id: existing.id.clone(),
                        spec: target,
                        changes,
                    });
                }
            }
        }
    }

    let mut actions = deletes;
    actions.extend(creates);
    actions.extend(updates);
    debug_assert!(actions.windows(2).all(|w| w[0].apply_rank() <= w[1].apply_rank()));

    ConvergencePlan {
        owner: owner.to_string(),
        actions,
        unchanged,
        errors,
    }
}

fn drift(live: &LiveWorker, target: &WorkerSpec) -> Vec<Drift> {
    let mut changes = Vec::new();
    if live.schedule != target.schedule {
        changes.push(Drift::Schedule {
            from: live.schedule.clone(),
            to: target.schedule.clone(),
        });
    }
    if live.code_body != target.code_body {
        changes.push(Drift::CodeBody);
    }
    if live.retention_seconds != target.retention_seconds {
        changes.push(Drift::Retention {
            from: live.retention_seconds,
            to: target.retention_seconds,
        });
    }
    changes
}

pub struct Reconciler<'a> {
    platform: &'a dyn WorkerPlatform,
    namespace: &'a ManagedNamespace,
}

impl<'a> Reconciler<'a> {
    pub fn new(platform: &'a dyn WorkerPlatform, namespace: &'a ManagedNamespace) -> Self {
        Self {
            platform,
            namespace,
        }
    }

    async fn inspect(&self, owner: &str) -> Result<Vec<LiveWorker>, StoreError> {
        FleetInspector::new(self.platform, self.namespace)
            .list(owner)
            .await
    }

    /// Inspect and diff without touching the store.
    pub async fn plan(&self, owner: &str, catalog: &Catalog) -> Result<ConvergencePlan, StoreError> {
        let live = self.inspect(owner).await?;
        Ok(diff(owner, catalog, &live))
    }

    /// Inspect, diff and apply. Only a failed inspection is returned as an
    /// error; individual store failures are recorded in the outcome.
    pub async fn reconcile(
        &self,
        owner: &str,
        catalog: &Catalog,
    ) -> Result<ReconcileOutcome, StoreError> {
        let live = self.inspect(owner).await?;
        let plan = diff(owner, catalog, &live);
        Ok(self.apply_plan(owner, catalog, &live, plan).await)
    }

    /// Apply `approved` only if a fresh diff still yields exactly that plan.
    /// Otherwise nothing is written and `PlanChanged` is returned.
    pub async fn reconcile_approved(
        &self,
        owner: &str,
        catalog: &Catalog,
        approved: &ConvergencePlan,
    ) -> crate::error::Result<ReconcileOutcome> {
        let live = self.inspect(owner).await?;
        let plan = diff(owner, catalog, &live);
        if plan != *approved {
            tracing::warn!(
                owner,
                approved = approved.actions.len(),
                current = plan.actions.len(),
                "live fleet changed since the plan was approved"
            );
            return Err(FleetError::PlanChanged {
                owner: owner.to_string(),
            });
        }
        Ok(self.apply_plan(owner, catalog, &live, plan).await)
    }

    async fn apply_plan(
        &self,
        owner: &str,
        catalog: &Catalog,
        live: &[LiveWorker],
        plan: ConvergencePlan,
    ) -> ReconcileOutcome {
        tracing::info!(
            owner,
            actions = plan.actions.len(),
            errors = plan.errors.len(),
            "applying convergence plan"
        );

        let mut outcomes = Vec::with_capacity(plan.actions.len());
        let mut written: HashMap<String, LiveWorker> = HashMap::new();

        for action in &plan.actions {
            let result = self.apply(owner, action).await;
            let status = match result {
                Ok(Some(worker)) => {
                    written.insert(worker.name.clone(), worker);
                    ActionStatus::Applied
                }
                Ok(None) => ActionStatus::Applied,
                Err(e) => {
                    tracing::warn!(
                        owner,
                        worker = %action.worker_name(),
                        action = %action.kind(),
                        error = %e,
                        "store operation failed; continuing with remaining actions"
                    );
                    ActionStatus::Failed(e.to_string())
                }
            };
            outcomes.push(ActionOutcome {
                action: action.clone(),
                status,
            });
        }

        let converged = converged_workers(catalog, live, &written);
        ReconcileOutcome {
            plan,
            outcomes,
            converged,
        }
    }

    async fn apply(&self, owner: &str, action: &Action) -> Result<Option<LiveWorker>, StoreError> {
        match action {
            Action::Delete { id, name } => {
                self.platform
                    .delete_worker(id)
                    .await
                    .map_err(|e| StoreError::operation(StoreAction::Delete, name, e))?;
                tracing::info!(owner, worker = %name, id = %id, "deleted worker");
                Ok(None)
            }
            Action::Create { spec } => {
                let new_worker = NewWorker {
                    name: spec.name.clone(),
                    schedule: spec.schedule.clone(),
                    code_body: spec.code_body.clone(),
                    retention_seconds: spec.retention_seconds,
                    language: spec.language.clone(),
                };
                let created = self
                    .platform
                    .create_worker(owner, &new_worker)
                    .await
                    .map_err(|e| StoreError::operation(StoreAction::Create, &spec.name, e))?;
                tracing::info!(owner, worker = %spec.name, id = %created.id, schedule = %spec.schedule, "created worker");
                Ok(Some(created))
            }
            Action::Update { id, spec, changes } => {
                let update = WorkerUpdate {
                    schedule: spec.schedule.clone(),
                    code_body: spec.code_body.clone(),
                    retention_seconds: spec.retention_seconds,
                };
                let updated = self
                    .platform
                    .update_worker(id, &update)
                    .await
                    .map_err(|e| StoreError::operation(StoreAction::Update, &spec.name, e))?;
                tracing::info!(owner, worker = %spec.name, id = %id, changes = changes.len(), "updated worker");
                Ok(Some(updated))
            }
        }
    }
}

/// Live record per catalog worker after apply: the freshly written record when
/// a create or update succeeded, otherwise the record observed before.
fn converged_workers(
    catalog: &Catalog,
    live: &[LiveWorker],
    written: &HashMap<String, LiveWorker>,
) -> Vec<LiveWorker> {
    catalog
        .specs()
        .iter()
        .filter_map(|spec| {
            written
                .get(&spec.name)
                .or_else(|| live.iter().find(|w| w.name == spec.name))
                .cloned()
        })
        .collect()
}
