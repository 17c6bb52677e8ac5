use super::{HttpPlatform, SqlitePlatform, WorkerPlatform};
use crate::config::{Config, PlatformKind};
use anyhow::Context;
use std::sync::Arc;

/// Build the platform adapter selected by `[platform] kind`.
pub async fn create_platform(config: &Config) -> anyhow::Result<Arc<dyn WorkerPlatform>> {
    let platform = &config.platform;
    match platform.kind {
        PlatformKind::Sqlite => {
            let url = platform
                .database_url
                .as_deref()
                .context("platform.database_url is not set")?;
            let sqlite = SqlitePlatform::connect(url, platform.page_size).await?;
            tracing::debug!(database = %url, "using sqlite platform");
            Ok(Arc::new(sqlite))
        }
        PlatformKind::Http => {
            let url = platform
                .api_url
                .as_deref()
                .context("platform.api_url is not set")?;
            let http = HttpPlatform::new(
                url,
                platform.api_token.as_deref(),
                platform.page_size,
                platform.request_timeout_secs,
            )?;
            tracing::debug!(api = %url, "using http platform");
            Ok(Arc::new(http))
        }
    }
}
