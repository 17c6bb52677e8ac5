//! Collaborator interface to the host automation platform.
//!
//! The platform owns agent records, their schedules and the events they emit.
//! Everything in [`crate::fleet`] talks to it exclusively through
//! [`WorkerPlatform`].

mod factory;
pub mod http;
pub mod memory;
pub mod sqlite;

pub use factory::create_platform;
pub use http::HttpPlatform;
pub use memory::InMemoryPlatform;
pub use sqlite::SqlitePlatform;

use crate::error::{ExecutionRequestError, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Observed state of one agent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveWorker {
    pub id: String,
    pub name: String,
    /// Raw schedule as stored; may be a legacy token.
    pub schedule: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub output_count: u64,
    #[serde(default)]
    pub last_output_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub code_body: String,
    #[serde(default)]
    pub retention_seconds: u64,
    #[serde(default)]
    pub language: String,
}

/// Payload for `create_worker`. The schedule is always canonical by the time
/// it reaches the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewWorker {
    pub name: String,
    pub schedule: String,
    pub code_body: String,
    pub retention_seconds: u64,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerUpdate {
    pub schedule: String,
    pub code_body: String,
    pub retention_seconds: u64,
}

/// One page of an owner's agent listing. Pages are 1-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorkerPage {
    pub workers: Vec<LiveWorker>,
    #[serde(default)]
    pub next_page: Option<u32>,
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

pub type ExecutionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), ExecutionRequestError>> + Send + 'a>>;

pub trait WorkerPlatform: Send + Sync {
    fn name(&self) -> &str;

    fn list_workers<'a>(&'a self, owner: &'a str, page: u32) -> StoreFuture<'a, WorkerPage>;

    fn create_worker<'a>(
        &'a self,
        owner: &'a str,
        worker: &'a NewWorker,
    ) -> StoreFuture<'a, LiveWorker>;

    fn update_worker<'a>(
        &'a self,
        id: &'a str,
        update: &'a WorkerUpdate,
    ) -> StoreFuture<'a, LiveWorker>;

    fn delete_worker<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ()>;

    /// Request one immediate run outside the worker's schedule.
    fn force_execute<'a>(&'a self, id: &'a str) -> ExecutionFuture<'a>;

    /// Current number of retained output records for a worker.
    fn output_count<'a>(&'a self, id: &'a str) -> StoreFuture<'a, u64>;
}
