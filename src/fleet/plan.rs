use super::catalog::WorkerSpec;
use crate::error::UnrecognizedScheduleError;
use crate::platform::LiveWorker;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Unchanged,
    /// Dropped while planning, e.g. for an unrecognized schedule.
    Skipped,
}

/// What differs between a live worker and its spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum Drift {
    Schedule { from: String, to: String },
    CodeBody,
    Retention { from: u64, to: u64 },
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schedule { from, to } => write!(f, "schedule {from} -> {to}"),
            Self::CodeBody => f.write_str("code body"),
            Self::Retention { from, to } => write!(f, "retention {from}s -> {to}s"),
        }
    }
}

/// One mutation against the live store. Specs carried here already hold the
/// canonical schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Create {
        spec: WorkerSpec,
    },
    Update {
        id: String,
        spec: WorkerSpec,
        changes: Vec<Drift>,
    },
    Delete {
        id: String,
        name: String,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Create { .. } => ActionKind::Create,
            Self::Update { .. } => ActionKind::Update,
            Self::Delete { .. } => ActionKind::Delete,
        }
    }

    pub fn worker_name(&self) -> &str {
        match self {
            Self::Create { spec } | Self::Update { spec, .. } => &spec.name,
            Self::Delete { name, .. } => name,
        }
    }

    /// Live id the action targets; `None` for creations.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::Create { .. } => None,
            Self::Update { id, .. } | Self::Delete { id, .. } => Some(id),
        }
    }

    /// Position in the apply sequence: deletes, then creates, then updates.
    pub(crate) fn apply_rank(&self) -> u8 {
        match self {
            Self::Delete { .. } => 0,
            Self::Create { .. } => 1,
            Self::Update { .. } => 2,
        }
    }
}

/// A worker whose action was dropped while planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanError {
    pub name: String,
    pub message: String,
    #[serde(skip)]
    pub error: UnrecognizedScheduleError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConvergencePlan {
    pub owner: String,
    /// Ordered for application: Delete, Create, Update.
    pub actions: Vec<Action>,
    /// Catalog workers already matching their spec.
    pub unchanged: Vec<String>,
    pub errors: Vec<PlanError>,
}

impl ConvergencePlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        match kind {
            ActionKind::Unchanged => self.unchanged.len(),
            ActionKind::Skipped => self.errors.len(),
            _ => self.actions.iter().filter(|a| a.kind() == kind).count(),
        }
    }

    pub fn action_for(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.worker_name() == name)
    }

    pub fn error_for(&self, name: &str) -> Option<&PlanError> {
        self.errors.iter().find(|e| e.name == name)
    }
}

impl fmt::Display for ConvergencePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Plan for {}: {} to create, {} to update, {} to delete, {} unchanged",
            self.owner,
            self.count(ActionKind::Create),
            self.count(ActionKind::Update),
            self.count(ActionKind::Delete),
            self.unchanged.len()
        )?;
        for action in &self.actions {
            match action {
                Action::Create { spec } => {
                    writeln!(f, "  + {} ({})", spec.name, spec.schedule)?;
                }
                Action::Update { spec, changes, .. } => {
                    let changes: Vec<String> = changes.iter().map(ToString::to_string).collect();
                    writeln!(f, "  ~ {} [{}]", spec.name, changes.join(", "))?;
                }
                Action::Delete { id, name } => writeln!(f, "  - {name} (id {id})")?,
            }
        }
        for error in &self.errors {
            writeln!(f, "  ! {}: {}", error.name, error.message)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ActionStatus {
    Applied,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub action: Action,
    pub status: ActionStatus,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == ActionStatus::Applied
    }
}

/// Plan plus what happened when it was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub plan: ConvergencePlan,
    pub outcomes: Vec<ActionOutcome>,
    /// Live record for every catalog worker that exists after the run, in
    /// catalog order. These are the verification targets.
    #[serde(skip)]
    pub converged: Vec<LiveWorker>,
}

impl ReconcileOutcome {
    pub fn outcome_for(&self, name: &str) -> Option<&ActionOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.action.worker_name() == name)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }
}
