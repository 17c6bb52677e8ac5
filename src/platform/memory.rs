//! In-process platform with a small engine simulator.
//!
//! Forced executions schedule an output record that becomes visible once its
//! delay has elapsed, so verification can be exercised without a real host.

use super::{
    ExecutionFuture, LiveWorker, NewWorker, StoreFuture, WorkerPage, WorkerPlatform, WorkerUpdate,
};
use crate::error::{ExecutionRequestError, StoreAction, StoreError};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const DEFAULT_PAGE_SIZE: usize = 50;

/// How the simulated engine reacts to a forced execution of a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionBehavior {
    /// One output record appears `after` the request.
    Emit { after: Duration },
    /// The run is accepted but produces nothing.
    Silent,
    /// The request itself is refused.
    Reject(String),
    /// The request hangs this long before being accepted; no output follows.
    Stall(Duration),
}

impl Default for ExecutionBehavior {
    fn default() -> Self {
        Self::Emit {
            after: Duration::ZERO,
        }
    }
}

/// Every call the platform received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    List { owner: String, page: u32 },
    Create { owner: String, name: String },
    Update { id: String },
    Delete { id: String },
    ForceExecute { id: String },
    OutputCount { id: String },
}

impl PlatformCall {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create { .. } | Self::Update { .. } | Self::Delete { .. }
        )
    }
}

struct StoredWorker {
    owner: String,
    worker: LiveWorker,
    pending_outputs: Vec<Instant>,
}

impl StoredWorker {
    fn settle(&mut self, now: Instant) {
        let before = self.pending_outputs.len();
        self.pending_outputs.retain(|ready_at| *ready_at > now);
        let matured = before - self.pending_outputs.len();
        if matured > 0 {
            self.worker.output_count += matured as u64;
            self.worker.last_output_at = Some(Utc::now());
        }
    }
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    workers: BTreeMap<u64, StoredWorker>,
    behaviors: HashMap<String, ExecutionBehavior>,
    store_failures: HashSet<(StoreAction, String)>,
    failing_list_pages: HashSet<u32>,
    calls: Vec<PlatformCall>,
}

impl MemoryState {
    fn lookup(&mut self, id: &str) -> Result<(u64, &mut StoredWorker), StoreError> {
        let key = id
            .parse::<u64>()
            .map_err(|_| StoreError::WorkerNotFound(id.to_string()))?;
        self.workers
            .get_mut(&key)
            .map(|stored| (key, stored))
            .ok_or_else(|| StoreError::WorkerNotFound(id.to_string()))
    }

    fn check_failure(&self, action: StoreAction, name: &str) -> Result<(), StoreError> {
        if self.store_failures.contains(&(action, name.to_string())) {
            return Err(StoreError::Backend(format!("injected failure for {action}")));
        }
        Ok(())
    }
}

pub struct InMemoryPlatform {
    state: Mutex<MemoryState>,
    page_size: usize,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_id: 1,
                ..MemoryState::default()
            }),
            page_size: page_size.max(1),
        }
    }

    /// Insert a live record directly, bypassing the journal. Returns its id.
    pub async fn seed(&self, owner: &str, name: &str, schedule: &str) -> String {
        self.seed_worker(
            owner,
            LiveWorker {
                id: String::new(),
                name: name.to_string(),
                schedule: schedule.to_string(),
                disabled: false,
                output_count: 0,
                last_output_at: None,
                code_body: String::new(),
                retention_seconds: 0,
                language: "javascript".into(),
            },
        )
        .await
    }

    pub async fn seed_worker(&self, owner: &str, mut worker: LiveWorker) -> String {
        let mut state = self.state.lock().await;
        let key = state.next_id;
        state.next_id += 1;
        worker.id = key.to_string();
        let id = worker.id.clone();
        state.workers.insert(
            key,
            StoredWorker {
                owner: owner.to_string(),
                worker,
                pending_outputs: Vec::new(),
            },
        );
        id
    }

    pub async fn set_behavior(&self, name: &str, behavior: ExecutionBehavior) {
        self.state
            .lock()
            .await
            .behaviors
            .insert(name.to_string(), behavior);
    }

    pub async fn fail_store_action(&self, action: StoreAction, name: &str) {
        self.state
            .lock()
            .await
            .store_failures
            .insert((action, name.to_string()));
    }

    pub async fn fail_list_page(&self, page: u32) {
        self.state.lock().await.failing_list_pages.insert(page);
    }

    /// Simulate a scheduled run of the engine.
    pub async fn emit_output(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let (_, stored) = state.lookup(id)?;
        stored.worker.output_count += 1;
        stored.worker.last_output_at = Some(Utc::now());
        Ok(())
    }

    pub async fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn mutation_count(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .count()
    }

    /// Every record for an owner, foreign ones included, ordered by id.
    pub async fn snapshot(&self, owner: &str) -> Vec<LiveWorker> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state
            .workers
            .values_mut()
            .filter(|stored| stored.owner == owner)
            .map(|stored| {
                stored.settle(now);
                stored.worker.clone()
            })
            .collect()
    }
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPlatform for InMemoryPlatform {
    fn name(&self) -> &str {
        "memory"
    }

    fn list_workers<'a>(&'a self, owner: &'a str, page: u32) -> StoreFuture<'a, WorkerPage> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.calls.push(PlatformCall::List {
                owner: owner.to_string(),
                page,
            });
            if state.failing_list_pages.contains(&page) {
                return Err(StoreError::Backend(format!(
                    "listing page {page} unavailable"
                )));
            }

            let now = Instant::now();
            let owned: Vec<LiveWorker> = state
                .workers
                .values_mut()
                .filter(|stored| stored.owner == owner)
                .map(|stored| {
                    stored.settle(now);
                    stored.worker.clone()
                })
                .collect();

            let start = (page.max(1) as usize - 1) * self.page_size;
            let workers: Vec<LiveWorker> = owned
                .iter()
                .skip(start)
                .take(self.page_size)
                .cloned()
                .collect();
            let next_page = (start + self.page_size < owned.len()).then_some(page.max(1) + 1);

            Ok(WorkerPage { workers, next_page })
        })
    }

    fn create_worker<'a>(
        &'a self,
        owner: &'a str,
        worker: &'a NewWorker,
    ) -> StoreFuture<'a, LiveWorker> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.calls.push(PlatformCall::Create {
                owner: owner.to_string(),
                name: worker.name.clone(),
            });
            state.check_failure(StoreAction::Create, &worker.name)?;

            let key = state.next_id;
            state.next_id += 1;
            let live = LiveWorker {
                id: key.to_string(),
                name: worker.name.clone(),
                schedule: worker.schedule.clone(),
                disabled: false,
                output_count: 0,
                last_output_at: None,
                code_body: worker.code_body.clone(),
                retention_seconds: worker.retention_seconds,
                language: worker.language.clone(),
            };
            state.workers.insert(
                key,
                StoredWorker {
                    owner: owner.to_string(),
                    worker: live.clone(),
                    pending_outputs: Vec::new(),
                },
            );
            Ok(live)
        })
    }

    fn update_worker<'a>(
        &'a self,
        id: &'a str,
        update: &'a WorkerUpdate,
    ) -> StoreFuture<'a, LiveWorker> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state
                .calls
                .push(PlatformCall::Update { id: id.to_string() });
            let name = state.lookup(id)?.1.worker.name.clone();
            state.check_failure(StoreAction::Update, &name)?;

            let (_, stored) = state.lookup(id)?;
            stored.worker.schedule.clone_from(&update.schedule);
            stored.worker.code_body.clone_from(&update.code_body);
            stored.worker.retention_seconds = update.retention_seconds;
            Ok(stored.worker.clone())
        })
    }

    fn delete_worker<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state
                .calls
                .push(PlatformCall::Delete { id: id.to_string() });
            let (key, stored) = state.lookup(id)?;
            let name = stored.worker.name.clone();
            state.check_failure(StoreAction::Delete, &name)?;
            state.workers.remove(&key);
            Ok(())
        })
    }

    fn force_execute<'a>(&'a self, id: &'a str) -> ExecutionFuture<'a> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state
                .calls
                .push(PlatformCall::ForceExecute { id: id.to_string() });

            let name = match state.lookup(id) {
                Ok((_, stored)) => stored.worker.name.clone(),
                Err(e) => {
                    return Err(ExecutionRequestError {
                        id: id.to_string(),
                        cause: e.to_string(),
                    });
                }
            };
            let behavior = state.behaviors.get(&name).cloned().unwrap_or_default();

            match behavior {
                ExecutionBehavior::Reject(cause) => Err(ExecutionRequestError {
                    id: id.to_string(),
                    cause,
                }),
                ExecutionBehavior::Silent => Ok(()),
                ExecutionBehavior::Stall(delay) => {
                    drop(state);
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
                ExecutionBehavior::Emit { after } => {
                    if let Ok((_, stored)) = state.lookup(id) {
                        stored.pending_outputs.push(Instant::now() + after);
                    }
                    Ok(())
                }
            }
        })
    }

    fn output_count<'a>(&'a self, id: &'a str) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state
                .calls
                .push(PlatformCall::OutputCount { id: id.to_string() });
            let (_, stored) = state.lookup(id)?;
            stored.settle(Instant::now());
            Ok(stored.worker.output_count)
        })
    }
}
