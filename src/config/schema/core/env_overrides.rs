use super::Config;
use crate::config::PlatformKind;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(owner) = std::env::var("FLEETSYNC_OWNER")
            && !owner.is_empty()
        {
            self.owner = Some(owner);
        }

        if let Ok(kind) = std::env::var("FLEETSYNC_PLATFORM") {
            match kind.to_ascii_lowercase().as_str() {
                "sqlite" => self.platform.kind = PlatformKind::Sqlite,
                "http" => self.platform.kind = PlatformKind::Http,
                "" => {}
                other => tracing::warn!(value = other, "ignoring unknown FLEETSYNC_PLATFORM"),
            }
        }

        if let Ok(url) = std::env::var("FLEETSYNC_DATABASE_URL")
            && !url.is_empty()
        {
            self.platform.database_url = Some(url);
        }

        if let Ok(url) = std::env::var("FLEETSYNC_API_URL")
            && !url.is_empty()
        {
            self.platform.api_url = Some(url);
        }

        if let Ok(token) = std::env::var("FLEETSYNC_API_TOKEN")
            && !token.is_empty()
        {
            self.platform.api_token = Some(token);
        }

        if let Ok(prefix) = std::env::var("FLEETSYNC_NAME_PREFIX")
            && !prefix.is_empty()
        {
            self.namespace.prefix = prefix;
        }
    }
}
