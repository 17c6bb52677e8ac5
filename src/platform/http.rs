//! JSON API adapter for a remote host.
//!
//! Routes (relative to `api_url`):
//! - `GET    users/{owner}/agents?page=&per_page=`
//! - `POST   users/{owner}/agents`
//! - `PUT    agents/{id}`
//! - `DELETE agents/{id}`
//! - `POST   agents/{id}/run`
//! - `GET    agents/{id}/events/count`

use super::{
    ExecutionFuture, LiveWorker, NewWorker, StoreFuture, WorkerPage, WorkerPlatform, WorkerUpdate,
};
use crate::error::{ExecutionRequestError, StoreError};
use anyhow::Context;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Deserialize)]
struct AgentListing {
    #[serde(default)]
    agents: Vec<LiveWorker>,
    #[serde(default)]
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EventCount {
    count: u64,
}

/// Which missing thing a 404 refers to.
enum Subject<'a> {
    Owner(&'a str),
    Worker(&'a str),
}

pub struct HttpPlatform {
    base_url: Url,
    /// Pre-computed `Authorization` header value.
    cached_auth: Option<String>,
    page_size: u32,
    client: Client,
}

impl HttpPlatform {
    pub fn new(
        api_url: &str,
        api_token: Option<&str>,
        page_size: u32,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(api_url).with_context(|| format!("Invalid platform API URL: {api_url}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Platform API URL cannot be used as a base: {api_url}");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to build platform HTTP client")?;

        Ok(Self {
            base_url,
            cached_auth: api_token.map(|token| format!("Bearer {token}")),
            page_size: page_size.max(1),
            client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Backend(format!("invalid base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.cached_auth {
            Some(auth) => builder.header("Authorization", auth),
            None => builder,
        }
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

async fn check(response: Response, subject: Subject<'_>) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(match subject {
            Subject::Owner(owner) => StoreError::OwnerNotFound(owner.to_string()),
            Subject::Worker(id) => StoreError::WorkerNotFound(id.to_string()),
        });
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Backend(describe_failure(status, &body)))
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("HTTP {status}");
    }
    let clipped: String = body.chars().take(MAX_ERROR_BODY).collect();
    format!("HTTP {status}: {clipped}")
}

impl WorkerPlatform for HttpPlatform {
    fn name(&self) -> &str {
        "http"
    }

    fn list_workers<'a>(&'a self, owner: &'a str, page: u32) -> StoreFuture<'a, WorkerPage> {
        Box::pin(async move {
            let url = self.endpoint(&["users", owner, "agents"])?;
            let response = self
                .request(Method::GET, url)
                .query(&[("page", page.max(1)), ("per_page", self.page_size)])
                .send()
                .await
                .map_err(transport)?;
            let listing: AgentListing = check(response, Subject::Owner(owner))
                .await?
                .json()
                .await
                .map_err(transport)?;
            Ok(WorkerPage {
                workers: listing.agents,
                next_page: listing.next_page,
            })
        })
    }

    fn create_worker<'a>(
        &'a self,
        owner: &'a str,
        worker: &'a NewWorker,
    ) -> StoreFuture<'a, LiveWorker> {
        Box::pin(async move {
            let url = self.endpoint(&["users", owner, "agents"])?;
            let response = self
                .request(Method::POST, url)
                .json(worker)
                .send()
                .await
                .map_err(transport)?;
            check(response, Subject::Owner(owner))
                .await?
                .json::<LiveWorker>()
                .await
                .map_err(transport)
        })
    }

    fn update_worker<'a>(
        &'a self,
        id: &'a str,
        update: &'a WorkerUpdate,
    ) -> StoreFuture<'a, LiveWorker> {
        Box::pin(async move {
            let url = self.endpoint(&["agents", id])?;
            let response = self
                .request(Method::PUT, url)
                .json(update)
                .send()
                .await
                .map_err(transport)?;
            check(response, Subject::Worker(id))
                .await?
                .json::<LiveWorker>()
                .await
                .map_err(transport)
        })
    }

    fn delete_worker<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let url = self.endpoint(&["agents", id])?;
            let response = self
                .request(Method::DELETE, url)
                .send()
                .await
                .map_err(transport)?;
            check(response, Subject::Worker(id)).await?;
            Ok(())
        })
    }

    fn force_execute<'a>(&'a self, id: &'a str) -> ExecutionFuture<'a> {
        Box::pin(async move {
            let request_error = |e: StoreError| ExecutionRequestError {
                id: id.to_string(),
                cause: e.to_string(),
            };
            let url = self.endpoint(&["agents", id, "run"]).map_err(request_error)?;
            let response = self
                .request(Method::POST, url)
                .send()
                .await
                .map_err(|e| request_error(transport(e)))?;
            check(response, Subject::Worker(id))
                .await
                .map_err(request_error)?;
            Ok(())
        })
    }

    fn output_count<'a>(&'a self, id: &'a str) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let url = self.endpoint(&["agents", id, "events", "count"])?;
            let response = self
                .request(Method::GET, url)
                .send()
                .await
                .map_err(transport)?;
            let count: EventCount = check(response, Subject::Worker(id))
                .await?
                .json()
                .await
                .map_err(transport)?;
            Ok(count.count)
        })
    }
}
