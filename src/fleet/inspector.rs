//! Read-only view of an owner's live workers, split into managed and foreign.

use crate::error::{StoreAction, StoreError};
use crate::platform::{LiveWorker, WorkerPlatform};
use std::collections::HashSet;

/// Upper bound on listing pages; a platform that keeps handing out pages past
/// this is treated as broken rather than drained forever.
const MAX_PAGES: u32 = 10_000;

/// Name-prefix predicate that decides which workers the catalog owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedNamespace {
    prefix: String,
}

impl ManagedNamespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn contains(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FleetSnapshot {
    pub managed: Vec<LiveWorker>,
    pub foreign: Vec<LiveWorker>,
}

pub struct FleetInspector<'a> {
    platform: &'a dyn WorkerPlatform,
    namespace: &'a ManagedNamespace,
}

impl<'a> FleetInspector<'a> {
    pub fn new(platform: &'a dyn WorkerPlatform, namespace: &'a ManagedNamespace) -> Self {
        Self {
            platform,
            namespace,
        }
    }

    /// Managed workers only. Foreign workers never leave this module.
    pub async fn list(&self, owner: &str) -> Result<Vec<LiveWorker>, StoreError> {
        Ok(self.snapshot(owner).await?.managed)
    }

    /// Drain every listing page, then partition. Any failed page fails the
    /// whole snapshot.
    pub async fn snapshot(&self, owner: &str) -> Result<FleetSnapshot, StoreError> {
        let mut seen = HashSet::new();
        let mut snapshot = FleetSnapshot::default();
        let mut page = 1;

        loop {
            let listing = self
                .platform
                .list_workers(owner, page)
                .await
                .map_err(|e| StoreError::operation(StoreAction::List, owner, e))?;

            for worker in listing.workers {
                // Records can shift between pages while we read; keep the first copy.
                if !seen.insert(worker.id.clone()) {
                    continue;
                }
                if self.namespace.contains(&worker.name) {
                    snapshot.managed.push(worker);
                } else {
                    snapshot.foreign.push(worker);
                }
            }

            match listing.next_page {
                Some(next) if next > page && next <= MAX_PAGES => page = next,
                Some(next) => {
                    return Err(StoreError::operation(
                        StoreAction::List,
                        owner,
                        format!("platform returned invalid next page {next} after page {page}"),
                    ));
                }
                None => break,
            }
        }

        tracing::debug!(
            owner,
            managed = snapshot.managed.len(),
            foreign = snapshot.foreign.len(),
            "fleet snapshot taken"
        );
        Ok(snapshot)
    }
}
