use super::super::{NamespaceConfig, PlatformConfig, PlatformKind, VerificationConfig};
use crate::error::ConfigError;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Account whose workers are reconciled when `--owner` is not given
    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default)]
    pub platform: PlatformConfig,

    #[serde(default)]
    pub namespace: NamespaceConfig,

    #[serde(default)]
    pub verification: VerificationConfig,
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());

        Self {
            config_path: home.join(".fleetsync").join("config.toml"),
            owner: None,
            platform: PlatformConfig::default(),
            namespace: NamespaceConfig::default(),
            verification: VerificationConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let verification = &self.verification;
        if verification.concurrency == 0 {
            return Err(ConfigError::Validation(
                "verification.concurrency must be at least 1".into(),
            ));
        }
        if verification.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "verification.poll_interval_ms must be positive".into(),
            ));
        }
        if verification.poll_interval() > verification.timeout() {
            return Err(ConfigError::Validation(format!(
                "verification.poll_interval_ms ({}) exceeds timeout_secs ({})",
                verification.poll_interval_ms, verification.timeout_secs
            )));
        }
        if self.namespace.prefix.trim().is_empty() {
            return Err(ConfigError::Validation(
                "namespace.prefix must not be empty".into(),
            ));
        }
        if self.platform.page_size == 0 {
            return Err(ConfigError::Validation(
                "platform.page_size must be at least 1".into(),
            ));
        }

        match self.platform.kind {
            PlatformKind::Sqlite if self.platform.database_url.is_none() => Err(
                ConfigError::Validation("platform.database_url is required for sqlite".into()),
            ),
            PlatformKind::Http if self.platform.api_url.is_none() => Err(
                ConfigError::Validation("platform.api_url is required for http".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Explicit owner wins over the configured default; one of them is required.
    pub fn resolve_owner(&self, explicit: Option<&str>) -> Result<String, ConfigError> {
        explicit
            .or(self.owner.as_deref())
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
            .map(ToString::to_string)
            .ok_or_else(|| {
                ConfigError::Validation(
                    "no owner given: pass --owner or set `owner` in config.toml".into(),
                )
            })
    }
}
