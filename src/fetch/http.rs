//! HTTP fetcher for VIRTA
//!
//! GETs a URL built from the request key via a template. Non-2xx responses
//! and transport errors both map to `FetchError` and are contained by the
//! pipeline like any other request failure.
//!
//! # Example
//!
//! ```ignore
//! let fetcher = HttpFetcher::new("https://random-data-api.com/api/{key}/random_{key}")?
//!     .header("Accept", "application/json");
//! ```

use crate::error::{FetchError, VirtaError};
use crate::fetch::Fetcher;
use crate::key::RequestKey;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP fetcher - GETs a templated URL per request key
///
/// The template may contain `{key}` placeholders; every occurrence is
/// replaced with the derived key.
pub struct HttpFetcher {
    client: Client,
    url_template: String,
    health_url: Option<String>,
    headers: HashMap<String, String>,
}

impl HttpFetcher {
    /// Create a new HttpFetcher for the given URL template
    ///
    /// Uses default timeouts: 30s request timeout, 10s connection timeout
    ///
    /// # Errors
    /// Returns `VirtaError::Config` if the HTTP client cannot be created
    pub fn new(url_template: impl Into<String>) -> Result<Self, VirtaError> {
        Self::with_timeout(url_template, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new HttpFetcher with a custom request timeout
    ///
    /// # Errors
    /// Returns `VirtaError::Config` if the HTTP client cannot be created
    pub fn with_timeout(
        url_template: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, VirtaError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| VirtaError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url_template: url_template.into(),
            health_url: None,
            headers: HashMap::new(),
        })
    }

    /// Set a custom health check URL
    ///
    /// By default, health checks use HEAD against the template base (the
    /// part before the first `{key}` placeholder).
    pub fn health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = Some(url.into());
        self
    }

    /// Add a custom header to all requests
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Build the request URL for a key
    pub fn url_for(&self, key: &RequestKey) -> String {
        self.url_template.replace("{key}", key.as_str())
    }

    /// The URL health checks go to
    fn health_target(&self) -> String {
        if let Some(url) = &self.health_url {
            return url.clone();
        }
        match self.url_template.split_once('{') {
            Some((base, _)) => base.trim_end_matches('/').to_string(),
            None => self.url_template.clone(),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, key: &RequestKey) -> Result<Bytes, FetchError> {
        let url = self.url_for(key);

        let mut request = self.client.get(&url);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| FetchError::Connection(format!("reading body: {e}")))?;
                    debug!(
                        url = %url,
                        status = %status,
                        bytes = body.len(),
                        "Fetch succeeded"
                    );
                    Ok(body)
                } else {
                    let body = response.text().await.unwrap_or_default();
                    error!(url = %url, status = %status, body = %body, "Fetch request failed");
                    Err(FetchError::Status {
                        status: status.as_u16(),
                        body,
                    })
                }
            }
            Err(e) => {
                error!(url = %url, error = %e, "Fetch connection failed");
                if e.is_builder() {
                    Err(FetchError::Endpoint(format!("invalid URL {url}: {e}")))
                } else {
                    Err(FetchError::Connection(format!(
                        "failed to reach {url}: {e}"
                    )))
                }
            }
        }
    }

    async fn health(&self) -> bool {
        let url = self.health_target();

        // HEAD is less invasive than GET for endpoints with side effects
        match self.client.head(&url).send().await {
            Ok(response) => {
                let healthy = response.status().is_success();
                debug!(url = %url, healthy = healthy, "Health check");
                healthy
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Health check failed");
                false
            }
        }
    }
}
