use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{PortalError, Result};
use crate::upload::UploadPreset;

pub const DEFAULT_BASE_URL: &str = "https://lazer-api.g0v0.top";
pub const DEFAULT_BBCODE_MAX_LENGTH: usize = 60_000;
pub const DEFAULT_VALIDATION_DEBOUNCE: Duration = Duration::from_millis(500);

/// Connection and behaviour settings for a [`crate::PortalClient`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: Url,
    pub client_id: u32,
    pub client_secret: String,
    pub user_agent: String,
    pub bbcode_max_length: usize,
    #[serde(with = "millis")]
    pub validation_debounce: Duration,
    pub avatar: UploadPreset,
    pub cover: UploadPreset,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            client_id: 0,
            client_secret: String::new(),
            user_agent: concat!("osu-portal/", env!("CARGO_PKG_VERSION")).to_string(),
            bbcode_max_length: DEFAULT_BBCODE_MAX_LENGTH,
            validation_debounce: DEFAULT_VALIDATION_DEBOUNCE,
            avatar: UploadPreset::avatar(),
            cover: UploadPreset::cover(),
        }
    }
}

impl PortalConfig {
    /// Defaults overridden by `OSU_PORTAL_BASE_URL`, `OSU_PORTAL_CLIENT_ID`
    /// and `OSU_PORTAL_CLIENT_SECRET` when set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(base) = std::env::var("OSU_PORTAL_BASE_URL") {
            config.base_url = Url::parse(&base)?;
        }
        if let Ok(id) = std::env::var("OSU_PORTAL_CLIENT_ID") {
            config.client_id = id
                .parse()
                .map_err(|_| PortalError::Config(format!("OSU_PORTAL_CLIENT_ID: {id}")))?;
        }
        if let Ok(secret) = std::env::var("OSU_PORTAL_CLIENT_SECRET") {
            config.client_secret = secret;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = Url::parse(base_url)?;
        Ok(self)
    }

    pub fn with_credentials(mut self, client_id: u32, client_secret: impl Into<String>) -> Self {
        self.client_id = client_id;
        self.client_secret = client_secret.into();
        self
    }

    pub fn with_validation_debounce(mut self, debounce: Duration) -> Self {
        self.validation_debounce = debounce;
        self
    }

    pub fn with_bbcode_max_length(mut self, max: usize) -> Self {
        self.bbcode_max_length = max;
        self
    }

    /// Resolve an API path such as `/api/v2/me` against the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PortalConfig::default();
        assert_eq!(config.bbcode_max_length, 60_000);
        assert_eq!(config.validation_debounce, Duration::from_millis(500));
        assert_eq!(config.avatar.max_width, 256);
    }

    #[test]
    fn endpoint_joins_paths() {
        let config = PortalConfig::default()
            .with_base_url("http://localhost:8000")
            .unwrap();
        assert_eq!(
            config.endpoint("/api/v2/me").unwrap().as_str(),
            "http://localhost:8000/api/v2/me"
        );
    }

    #[test]
    fn deserializes_partial_json() {
        let config: PortalConfig = serde_json::from_str(
            r#"{"base_url": "http://example.test", "client_id": 5, "validation_debounce": 250}"#,
        )
        .unwrap();
        assert_eq!(config.client_id, 5);
        assert_eq!(config.validation_debounce, Duration::from_millis(250));
        assert_eq!(config.bbcode_max_length, DEFAULT_BBCODE_MAX_LENGTH);
    }
}
