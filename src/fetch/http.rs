//! HTTP GET fetcher.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::Result;
use crate::fetch::Fetcher;

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "page_cache/0.1")
    pub user_agent: String,
    /// Whole-request timeout (default: 30s)
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "page_cache/0.1".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Fetches a URL and returns its body as text.
///
/// Any HTTP status counts as a page; only transport and decoding errors
/// fail.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let start = Instant::now();

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(
            url,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "page fetched"
        );

        Ok(body)
    }
}
