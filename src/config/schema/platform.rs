use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlatformKind {
    /// Talk to the host database directly.
    #[default]
    Sqlite,
    /// Talk to the host's JSON API.
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub kind: PlatformKind,
    /// `sqlite://` URL or a plain path (`~` is expanded)
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    /// Workers requested per listing page (default: 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_page_size() -> u32 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            kind: PlatformKind::default(),
            database_url: None,
            api_url: None,
            api_token: None,
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
