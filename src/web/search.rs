//! Search capability and the `SearXNG` backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::WebError;

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Result title.
    pub title: String,
    /// Result snippet.
    pub description: String,
    /// Result URL. May be empty when the backend omits it.
    pub url: String,
}

/// Capability: ranked source candidates for a query.
#[async_trait]
pub trait Searcher: Send + Sync {
    /// Returns at most `count` results for `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`WebError`] on transport or decode failures.
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, WebError>;
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Searcher backed by a `SearXNG` instance's JSON API.
#[derive(Debug, Clone)]
pub struct SearxngSearcher {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    backoff: Duration,
}

impl SearxngSearcher {
    /// Creates a searcher for the instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`WebError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration, max_retries: u32) -> Result<Self, WebError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("deep-research/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            backoff: Duration::from_secs(1),
        })
    }

    /// Overrides the initial retry delay (doubles on each retry).
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn parse_results(body: SearxngResponse, count: usize) -> Vec<SearchHit> {
        body.results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title.trim().to_string(),
                description: r
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .or(r.description)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                url: r.url.trim().to_string(),
            })
            .take(count)
            .collect()
    }
}

#[async_trait]
impl Searcher for SearxngSearcher {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, WebError> {
        let url = format!("{}/search", self.base_url);
        let mut delay = self.backoff;
        let mut attempt = 0;

        loop {
            let sent = self
                .client
                .get(&url)
                .query(&[("q", query), ("format", "json"), ("categories", "general")])
                .send()
                .await;

            let retryable = match sent {
                Ok(response) if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    WebError::RateLimited { retries: attempt }
                }
                Ok(response) if !response.status().is_success() => {
                    return Err(WebError::Http {
                        message: format!("search returned {}", response.status()),
                        status: Some(response.status().as_u16()),
                    });
                }
                Ok(response) => {
                    let body: SearxngResponse =
                        response.json().await.map_err(|e| WebError::Decode {
                            message: e.to_string(),
                        })?;
                    let hits = Self::parse_results(body, count);
                    debug!(query, hits = hits.len(), "search completed");
                    return Ok(hits);
                }
                Err(e) => WebError::from(e),
            };

            if attempt >= self.max_retries {
                return Err(match retryable {
                    WebError::RateLimited { .. } => WebError::RateLimited { retries: attempt },
                    other => other,
                });
            }
            attempt += 1;
            warn!(query, attempt, delay_ms = delay.as_millis(), error = %retryable, "search failed, retrying");
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }
}
