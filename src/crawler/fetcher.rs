//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests for a primary record (`home/{id}`)
//! - Best-effort GET requests for auxiliary sub-records (`home/services/{id}`)
//! - Error classification
//!
//! The fetcher performs a single attempt per call. Retrying the primary
//! fetch is the job of the retry controller.

use crate::config::{Config, UserAgentConfig};
use crate::HarvestError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Transient failure of a single primary fetch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Unreadable response body from {url}: {message}")]
    Body { url: String, message: String },
}

/// Source of raw records for work items
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetches the primary response body for a work item
    async fn fetch_primary(&self, item_id: &str) -> Result<Value, FetchError>;

    /// Fetches the auxiliary sub-records of a remote record
    ///
    /// Never fails: any error yields an empty list.
    async fn fetch_auxiliary(&self, record_id: &str) -> Vec<Value>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Timeout applied to every request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Record source backed by the remote HTTP API
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base: Url,
    auxiliary_delay: Duration,
}

impl HttpFetcher {
    pub fn new(client: Client, base: Url, auxiliary_delay: Duration) -> Self {
        Self {
            client,
            base,
            auxiliary_delay,
        }
    }

    /// Builds the fetcher from the `[api]`, `[crawler]` and `[user-agent]` sections
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let base = Url::parse(&config.api.base_url)?;
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
        Ok(Self::new(client, base, config.crawler.auxiliary_delay()))
    }

    /// Resolves `segments` below the base URL, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Network {
                url: self.base.to_string(),
                message: "base URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<Value, FetchError> {
        let url_str = url.to_string();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(&url_str, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url_str,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(&url_str, e))?;

        serde_json::from_slice(&body).map_err(|e| FetchError::Body {
            url: url_str,
            message: e.to_string(),
        })
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_body() || error.is_decode() {
        FetchError::Body {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl RecordSource for HttpFetcher {
    async fn fetch_primary(&self, item_id: &str) -> Result<Value, FetchError> {
        let url = self.endpoint(&["home", item_id])?;
        tracing::debug!("GET {}", url);
        self.get_json(url).await
    }

    async fn fetch_auxiliary(&self, record_id: &str) -> Vec<Value> {
        tokio::time::sleep(self.auxiliary_delay).await;

        let url = match self.endpoint(&["home", "services", record_id]) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("No auxiliary records for {}: {}", record_id, e);
                return Vec::new();
            }
        };
        tracing::debug!("GET {}", url);

        match self.get_json(url).await {
            Ok(mut body) => match body.get_mut("data").map(Value::take) {
                Some(Value::Array(records)) => records,
                _ => {
                    tracing::debug!("Auxiliary response for {} has no data list", record_id);
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::debug!("Auxiliary fetch for {} failed: {}", record_id, e);
                Vec::new()
            }
        }
    }
}
