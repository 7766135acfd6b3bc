//! Registry client implementation
//!
//! Queries version listings and release feeds over HTTP. Every request is a
//! single, timeout-bounded attempt.

use std::time::Duration;

use crate::config::defaults;
use crate::error::DownloadError;
use crate::registry::models::{Release, RegistryVersion};

/// HTTP client for plugin registries and release feeds
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// HTTP client
    client: reqwest::Client,
}

impl RegistryClient {
    /// Create a registry client with the default request timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(defaults::HTTP_TIMEOUT_SECS))
    }

    /// Create a registry client with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("gamestack/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Get the HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch a version listing (newest first, as the registry returns it)
    pub async fn list_versions(&self, url: &str) -> Result<Vec<RegistryVersion>, DownloadError> {
        self.get_json(url).await
    }

    /// Fetch the latest release of a release feed
    pub async fn latest_release(&self, url: &str) -> Result<Release, DownloadError> {
        self.get_json(url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, DownloadError> {
        let network = |error: String| DownloadError::NetworkError {
            url: url.to_string(),
            error,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(network(format!("HTTP {}", response.status())));
        }

        response.json::<T>().await.map_err(|e| network(e.to_string()))
    }
}

impl Default for RegistryClient {
    fn default() -> Self {
        Self::new()
    }
}
