use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `fleetsync`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; CLI glue continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum FleetError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Catalog ─────────────────────────────────────────────────────────
    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),

    // ── Schedule ────────────────────────────────────────────────────────
    #[error("schedule: {0}")]
    Schedule(#[from] UnrecognizedScheduleError),

    // ── Live store ──────────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Execution engine ────────────────────────────────────────────────
    #[error("execution: {0}")]
    Execution(#[from] ExecutionRequestError),

    // ── Approved plan went stale ────────────────────────────────────────
    #[error("live fleet for {owner} changed after the plan was approved; review the new plan")]
    PlanChanged { owner: String },

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Catalog errors ──────────────────────────────────────────────────────────

/// One rejected catalog entry. `index` is the zero-based position in the
/// source file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecViolation {
    #[error("entry #{index}: worker name is empty")]
    EmptyName { index: usize },

    #[error("entry #{index} ({name}): retention must be non-negative, got {retention}")]
    NegativeRetention {
        index: usize,
        name: String,
        retention: i64,
    },

    #[error("entry #{index}: duplicate worker name {name:?}")]
    DuplicateSpecName { index: usize, name: String },

    #[error("entry #{index} ({name}): name is outside the managed prefix {prefix:?}")]
    OutsideNamespace {
        index: usize,
        name: String,
        prefix: String,
    },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse catalog {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported catalog format: {0} (expected .toml or .json)")]
    UnsupportedFormat(String),

    #[error("{}", render_violations(.0))]
    Invalid(Vec<SpecViolation>),
}

impl CatalogError {
    /// Duplicate names found during validation, in catalog order.
    pub fn duplicate_names(&self) -> Vec<&str> {
        match self {
            Self::Invalid(violations) => violations
                .iter()
                .filter_map(|v| match v {
                    SpecViolation::DuplicateSpecName { name, .. } => Some(name.as_str()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn render_violations(violations: &[SpecViolation]) -> String {
    let noun = if violations.len() == 1 {
        "entry"
    } else {
        "entries"
    };
    let details = violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!("{} invalid catalog {noun}: {details}", violations.len())
}

// ─── Schedule errors ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized schedule token {token:?}")]
pub struct UnrecognizedScheduleError {
    pub token: String,
}

// ─── Store errors ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StoreAction {
    List,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{action} of worker {name:?} failed: {cause}")]
    Operation {
        action: StoreAction,
        name: String,
        cause: String,
    },

    #[error("owner {0:?} not found")]
    OwnerNotFound(String),

    #[error("worker {0} not found")]
    WorkerNotFound(String),

    #[error("backend: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn operation(action: StoreAction, name: impl Into<String>, cause: impl ToString) -> Self {
        Self::Operation {
            action,
            name: name.into(),
            cause: cause.to_string(),
        }
    }
}

// ─── Execution errors ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
#[error("forced execution of worker {id} could not be requested: {cause}")]
pub struct ExecutionRequestError {
    pub id: String,
    pub cause: String,
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, FleetError>;
