//! Direct access to the host database: `users`, `agents`, `events` and the
//! `agent_check_requests` queue consumed by the engine's job runner.

use super::{
    ExecutionFuture, LiveWorker, NewWorker, StoreFuture, WorkerPage, WorkerPlatform, WorkerUpdate,
};
use crate::error::{ExecutionRequestError, StoreError};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

const AGENT_TYPE: &str = "Agents::JavaScriptAgent";

/// Agent options blob as the engine stores it.
#[derive(Debug, Deserialize)]
struct AgentOptions {
    #[serde(default)]
    language: String,
    #[serde(default)]
    code: String,
}

pub struct SqlitePlatform {
    pool: SqlitePool,
    page_size: u32,
}

impl SqlitePlatform {
    /// Open (or create) the database. Accepts a `sqlite:` URL or a file path.
    pub async fn connect(database_url: &str, page_size: u32) -> Result<Self> {
        let url = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            let path = shellexpand::tilde(database_url).into_owned();
            if let Some(parent) = std::path::Path::new(&path).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
            }
            format!("sqlite://{path}?mode=rwc")
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .with_context(|| format!("Failed to open platform DB: {database_url}"))?;

        ensure_schema(&pool).await?;
        Ok(Self {
            pool,
            page_size: page_size.max(1),
        })
    }

    /// Return the id of the user with `email`, creating the row if missing.
    pub async fn ensure_user(&self, email: &str) -> Result<i64> {
        sqlx::query("INSERT OR IGNORE INTO users (email, created_at) VALUES (?, ?)")
            .bind(email)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to insert user")?;
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .context("Failed to read user id")?;
        Ok(id)
    }

    /// Append one event for an agent, as a scheduled run would.
    pub async fn record_event(&self, agent_id: &str, payload: &serde_json::Value) -> Result<()> {
        sqlx::query("INSERT INTO events (agent_id, payload, created_at) VALUES (?, ?, ?)")
            .bind(agent_id)
            .bind(payload.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to insert event")?;
        Ok(())
    }

    /// Unprocessed forced-run requests for an agent.
    pub async fn pending_checks(&self, agent_id: &str) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM agent_check_requests WHERE agent_id = ? AND processed_at IS NULL",
        )
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Mark every queued forced run as processed and return the agent ids, in
    /// request order. This is the job runner's side of the queue.
    pub async fn claim_check_requests(&self) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(
            "SELECT id, agent_id FROM agent_check_requests
             WHERE processed_at IS NULL ORDER BY id ASC",
        )
        .fetch_all(&mut *tx)
        .await
        .context("Failed to read check requests")?;

        let now = Utc::now().to_rfc3339();
        let mut agents = Vec::with_capacity(rows.len());
        for row in rows {
            let request_id: i64 = row.try_get("id")?;
            sqlx::query("UPDATE agent_check_requests SET processed_at = ? WHERE id = ?")
                .bind(&now)
                .bind(request_id)
                .execute(&mut *tx)
                .await?;
            agents.push(row.try_get("agent_id")?);
        }
        tx.commit().await?;
        Ok(agents)
    }

    /// Owners are matched by email first, then by numeric id.
    async fn resolve_owner(&self, owner: &str) -> Result<i64, StoreError> {
        let by_email = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = ?")
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        if let Some(id) = by_email {
            return Ok(id);
        }

        if let Ok(numeric) = owner.parse::<i64>() {
            let by_id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = ?")
                .bind(numeric)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
            if let Some(id) = by_id {
                return Ok(id);
            }
        }

        Err(StoreError::OwnerNotFound(owner.to_string()))
    }

    async fn fetch_worker(&self, id: &str) -> Result<LiveWorker, StoreError> {
        let row = sqlx::query(&format!("{SELECT_AGENT} WHERE a.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::WorkerNotFound(id.to_string()))?;
        row_to_worker(&row)
    }
}

const SELECT_AGENT: &str = "SELECT a.id, a.name, a.schedule, a.disabled, a.keep_events_for, a.options,
        (SELECT COUNT(*) FROM events e WHERE e.agent_id = a.id) AS output_count,
        (SELECT MAX(e.created_at) FROM events e WHERE e.agent_id = a.id) AS last_output_at
     FROM agents a";

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn row_to_worker(row: &SqliteRow) -> Result<LiveWorker, StoreError> {
    let id: String = row.try_get("id").map_err(backend)?;
    let options_raw: String = row.try_get("options").map_err(backend)?;
    let options = parse_options(&id, &options_raw);
    let output_count: i64 = row.try_get("output_count").map_err(backend)?;
    let retention: i64 = row.try_get("keep_events_for").map_err(backend)?;
    let last_output_at: Option<String> = row.try_get("last_output_at").map_err(backend)?;

    Ok(LiveWorker {
        id,
        name: row.try_get("name").map_err(backend)?,
        schedule: row.try_get("schedule").map_err(backend)?,
        disabled: row.try_get::<i64, _>("disabled").map_err(backend)? != 0,
        output_count: u64::try_from(output_count).unwrap_or(0),
        last_output_at: last_output_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        code_body: options.code,
        retention_seconds: u64::try_from(retention).unwrap_or(0),
        language: options.language,
    })
}

/// An unreadable blob is treated as empty options so the worker still lists
/// and the next apply rewrites it.
fn parse_options(agent_id: &str, raw: &str) -> AgentOptions {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(agent = %agent_id, error = %e, "agent options are not valid JSON; treating code as empty");
        AgentOptions {
            language: String::new(),
            code: String::new(),
        }
    })
}

fn options_json(language: &str, code: &str) -> String {
    serde_json::json!({ "language": language, "code": code }).to_string()
}

async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    for statement in [
        "CREATE TABLE IF NOT EXISTS users (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            email      TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS agents (
            id              TEXT PRIMARY KEY,
            user_id         INTEGER NOT NULL REFERENCES users(id),
            type            TEXT NOT NULL,
            name            TEXT NOT NULL,
            schedule        TEXT NOT NULL,
            disabled        INTEGER NOT NULL DEFAULT 0,
            keep_events_for INTEGER NOT NULL DEFAULT 0,
            options         TEXT NOT NULL DEFAULT '{}',
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS events (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_id   TEXT NOT NULL,
            payload    TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS agent_check_requests (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_id     TEXT NOT NULL,
            requested_at TEXT NOT NULL,
            processed_at TEXT
        )",
        "CREATE INDEX IF NOT EXISTS idx_agents_user ON agents(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_events_agent ON events(agent_id)",
    ] {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to prepare platform schema")?;
    }
    Ok(())
}

impl WorkerPlatform for SqlitePlatform {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn list_workers<'a>(&'a self, owner: &'a str, page: u32) -> StoreFuture<'a, WorkerPage> {
        Box::pin(async move {
            let user_id = self.resolve_owner(owner).await?;
            let page = page.max(1);
            let offset = i64::from(page - 1) * i64::from(self.page_size);

            // One extra row tells us whether another page exists.
            let rows = sqlx::query(&format!(
                "{SELECT_AGENT} WHERE a.user_id = ? ORDER BY a.created_at, a.rowid LIMIT ? OFFSET ?"
            ))
            .bind(user_id)
            .bind(i64::from(self.page_size) + 1)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

            let has_more = rows.len() > self.page_size as usize;
            let workers = rows
                .iter()
                .take(self.page_size as usize)
                .map(row_to_worker)
                .collect::<Result<Vec<_>, _>>()?;

            Ok(WorkerPage {
                workers,
                next_page: has_more.then_some(page + 1),
            })
        })
    }

    fn create_worker<'a>(
        &'a self,
        owner: &'a str,
        worker: &'a NewWorker,
    ) -> StoreFuture<'a, LiveWorker> {
        Box::pin(async move {
            let user_id = self.resolve_owner(owner).await?;
            let id = Uuid::new_v4().to_string();
            let now = Utc::now().to_rfc3339();

            sqlx::query(
                "INSERT INTO agents (
                    id, user_id, type, name, schedule, disabled, keep_events_for, options,
                    created_at, updated_at
                 ) VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(user_id)
            .bind(AGENT_TYPE)
            .bind(&worker.name)
            .bind(&worker.schedule)
            .bind(i64::try_from(worker.retention_seconds).unwrap_or(i64::MAX))
            .bind(options_json(&worker.language, &worker.code_body))
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

            self.fetch_worker(&id).await
        })
    }

    fn update_worker<'a>(
        &'a self,
        id: &'a str,
        update: &'a WorkerUpdate,
    ) -> StoreFuture<'a, LiveWorker> {
        Box::pin(async move {
            let current = self.fetch_worker(id).await?;
            let language = if current.language.is_empty() {
                "javascript"
            } else {
                current.language.as_str()
            };

            sqlx::query(
                "UPDATE agents
                 SET schedule = ?, keep_events_for = ?, options = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(&update.schedule)
            .bind(i64::try_from(update.retention_seconds).unwrap_or(i64::MAX))
            .bind(options_json(language, &update.code_body))
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

            self.fetch_worker(id).await
        })
    }

    fn delete_worker<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(backend)?;

            let removed = sqlx::query("DELETE FROM agents WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            if removed.rows_affected() == 0 {
                return Err(StoreError::WorkerNotFound(id.to_string()));
            }
            for statement in [
                "DELETE FROM events WHERE agent_id = ?",
                "DELETE FROM agent_check_requests WHERE agent_id = ?",
            ] {
                sqlx::query(statement)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;
            }

            tx.commit().await.map_err(backend)?;
            Ok(())
        })
    }

    fn force_execute<'a>(&'a self, id: &'a str) -> ExecutionFuture<'a> {
        Box::pin(async move {
            let request_error = |cause: String| ExecutionRequestError {
                id: id.to_string(),
                cause,
            };

            let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM agents WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| request_error(e.to_string()))?;
            if exists == 0 {
                return Err(request_error("agent does not exist".into()));
            }

            sqlx::query("INSERT INTO agent_check_requests (agent_id, requested_at) VALUES (?, ?)")
                .bind(id)
                .bind(Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await
                .map_err(|e| request_error(e.to_string()))?;

            tracing::debug!(agent = %id, "queued forced run");
            Ok(())
        })
    }

    fn output_count<'a>(&'a self, id: &'a str) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events WHERE agent_id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }
}
