//! HTTP transport configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`HttpRemoteApi`](super::HttpRemoteApi).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Base URL of the main API, with trailing slash.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Base URL of the upload host, with trailing slash.
    #[serde(default = "default_upload_base_url")]
    pub upload_base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Payload chunk size used for progress reporting.
    #[serde(default = "default_chunk_size")]
    pub upload_chunk_size: usize,
}

fn default_api_base_url() -> String {
    "https://api.observepoint.com/v2/".to_string()
}

fn default_upload_base_url() -> String {
    "https://upload.observepoint.com/v2/".to_string()
}

fn default_timeout() -> f64 {
    300.0
}

fn default_user_agent() -> String {
    format!("appflow/{}", env!("CARGO_PKG_VERSION"))
}

fn default_chunk_size() -> usize {
    64 * 1024
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            upload_base_url: default_upload_base_url(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            upload_chunk_size: default_chunk_size(),
        }
    }
}

impl HttpConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Sets the upload base URL.
    #[must_use]
    pub fn with_upload_base_url(mut self, url: impl Into<String>) -> Self {
        self.upload_base_url = url.into();
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Returns the timeout as a Duration. Non-positive, non-finite and
    /// unrepresentable values fall back to the default.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(default_timeout()))
    }

    /// Joins `path` onto the API base URL.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        join_url(&self.api_base_url, path)
    }

    /// Joins `path` onto the upload base URL.
    #[must_use]
    pub fn upload_url(&self, path: &str) -> String {
        join_url(&self.upload_base_url, path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
