//! Desired-state catalog: the workers an operator wants present for one owner.

use super::inspector::ManagedNamespace;
use crate::error::{CatalogError, SpecViolation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Output retention used by every provisioning script so far: seven days.
pub const DEFAULT_RETENTION_SECONDS: u64 = 604_800;

const CURRENT_CATALOG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub name: String,
    /// Raw token from the catalog; normalized by the reconciler.
    pub schedule: String,
    pub code_body: String,
    pub retention_seconds: u64,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WorkerSpec {
    pub fn new(
        name: impl Into<String>,
        schedule: impl Into<String>,
        code_body: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            schedule: schedule.into(),
            code_body: code_body.into(),
            retention_seconds: DEFAULT_RETENTION_SECONDS,
            language: default_language(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_retention(mut self, seconds: u64) -> Self {
        self.retention_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One `[[workers]]` entry as written by the operator, before validation.
#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    name: String,
    schedule: String,
    #[serde(alias = "code")]
    code_body: String,
    #[serde(default = "default_retention", alias = "keep_events_for")]
    retention_seconds: i64,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    workers: Vec<CatalogEntry>,
}

fn default_retention() -> i64 {
    DEFAULT_RETENTION_SECONDS as i64
}

fn default_language() -> String {
    "javascript".into()
}

fn default_version() -> u32 {
    CURRENT_CATALOG_VERSION
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    version: u32,
    specs: Vec<WorkerSpec>,
}

impl Catalog {
    /// Validate already-typed specs, e.g. ones built in code.
    pub fn from_specs(
        specs: Vec<WorkerSpec>,
        namespace: &ManagedNamespace,
    ) -> Result<Self, CatalogError> {
        let entries = specs
            .into_iter()
            .map(|spec| CatalogEntry {
                name: spec.name,
                schedule: spec.schedule,
                code_body: spec.code_body,
                retention_seconds: i64::try_from(spec.retention_seconds).unwrap_or(i64::MAX),
                language: spec.language,
                description: spec.description,
            })
            .collect();
        Self::validate(CURRENT_CATALOG_VERSION, entries, namespace)
    }

    /// Read a `.toml` or `.json` catalog file. `~` in the path is expanded.
    pub fn load(path: &str, namespace: &ManagedNamespace) -> Result<Self, CatalogError> {
        let expanded = shellexpand::tilde(path).into_owned();
        let extension = Path::new(&expanded)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let contents = std::fs::read_to_string(&expanded).map_err(|e| CatalogError::Read {
            path: expanded.clone(),
            message: e.to_string(),
        })?;

        let parsed = match extension.as_str() {
            "toml" => Self::parse_toml(&contents, namespace),
            "json" => Self::parse_json(&contents, namespace),
            _ => return Err(CatalogError::UnsupportedFormat(expanded)),
        };
        parsed.map_err(|e| match e {
            CatalogError::Parse { message, .. } => CatalogError::Parse {
                path: expanded,
                message,
            },
            other => other,
        })
    }

    pub fn parse_toml(contents: &str, namespace: &ManagedNamespace) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(contents).map_err(|e| CatalogError::Parse {
            path: "<toml>".into(),
            message: e.to_string(),
        })?;
        Self::validate(file.version, file.workers, namespace)
    }

    pub fn parse_json(contents: &str, namespace: &ManagedNamespace) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_json::from_str(contents).map_err(|e| CatalogError::Parse {
                path: "<json>".into(),
                message: e.to_string(),
            })?;
        Self::validate(file.version, file.workers, namespace)
    }

    /// Check every entry and report all violations at once.
    fn validate(
        version: u32,
        entries: Vec<CatalogEntry>,
        namespace: &ManagedNamespace,
    ) -> Result<Self, CatalogError> {
        let mut violations = Vec::new();
        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(entries.len());

        for (index, entry) in entries.into_iter().enumerate() {
            let name = entry.name.trim().to_string();
            let mut valid = true;

            if name.is_empty() {
                violations.push(SpecViolation::EmptyName { index });
                valid = false;
            } else {
                if !seen.insert(name.clone()) {
                    violations.push(SpecViolation::DuplicateSpecName {
                        index,
                        name: name.clone(),
                    });
                    valid = false;
                }
                if !namespace.contains(&name) {
                    violations.push(SpecViolation::OutsideNamespace {
                        index,
                        name: name.clone(),
                        prefix: namespace.prefix().to_string(),
                    });
                    valid = false;
                }
            }

            let retention = u64::try_from(entry.retention_seconds);
            if retention.is_err() {
                violations.push(SpecViolation::NegativeRetention {
                    index,
                    name: name.clone(),
                    retention: entry.retention_seconds,
                });
                valid = false;
            }

            if let (true, Ok(retention_seconds)) = (valid, retention) {
                specs.push(WorkerSpec {
                    name,
                    schedule: entry.schedule,
                    code_body: entry.code_body,
                    retention_seconds,
                    language: entry.language,
                    description: entry.description,
                });
            }
        }

        if !violations.is_empty() {
            return Err(CatalogError::Invalid(violations));
        }

        Ok(Self { version, specs })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn specs(&self) -> &[WorkerSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&WorkerSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
