use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BalanceError, Result};
use crate::pagination::PaginationConfig;

pub const API_KEY_ENV: &str = "THEGRAPH_API_KEY";
pub const API_URL_ENV: &str = "THEGRAPH_API_URL";
pub const DEFAULT_BASE_URL: &str = "https://token-api.thegraph.com/v1/evm";

/// Settings for a [`crate::BalanceClient`].
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub pagination: PaginationConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            pagination: PaginationConfig::default(),
        }
    }
}

// Keeps the key out of logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("pagination", &self.pagination)
            .finish()
    }
}

impl ClientConfig {
    /// Defaults, with the key and base URL taken from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default().with_api_key(lookup(API_KEY_ENV));
        if let Some(url) = lookup(API_URL_ENV).filter(|url| !url.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        config
    }

    /// Parse a JSON settings document; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| BalanceError::Configuration(format!("invalid client configuration: {e}")))
    }

    /// Sets the key when `api_key` holds a non-blank value.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|key| !key.trim().is_empty()) {
            self.api_key = Some(key.trim().to_string());
        }
        self
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            BalanceError::Configuration(format!(
                "The Graph API key is required. Provide it as parameter or set {API_KEY_ENV} environment variable."
            ))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
