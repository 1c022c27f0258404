//! Fetch capability and the HTTP page fetcher.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::html::{TextCleaner, html_to_text};
use crate::error::WebError;

/// Capability: readable text for a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and returns its extracted text.
    ///
    /// `Ok(None)` means the page was reachable but carried no usable text
    /// (non-text content type, error status, or too little text).
    ///
    /// # Errors
    ///
    /// Returns [`WebError`] for invalid URLs and transport failures.
    async fn fetch(&self, url: &str) -> Result<Option<String>, WebError>;
}

/// Fetcher that downloads pages over HTTP and strips them to text.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    cleaner: TextCleaner,
    min_content_length: usize,
    max_content_length: usize,
}

impl HttpFetcher {
    /// Creates a fetcher with the given timeout and length bounds.
    ///
    /// # Errors
    ///
    /// Returns [`WebError`] if the HTTP client or the text cleaner cannot
    /// be built.
    pub fn new(
        timeout: Duration,
        min_content_length: usize,
        max_content_length: usize,
    ) -> Result<Self, WebError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("Mozilla/5.0 (compatible; deep-research/", env!("CARGO_PKG_VERSION"), ")"))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        let cleaner = TextCleaner::new().map_err(|e| WebError::Decode {
            message: format!("text cleaner: {e}"),
        })?;
        Ok(Self {
            client,
            cleaner,
            min_content_length,
            max_content_length,
        })
    }

    fn extract(&self, content_type: &str, body: &str) -> Option<String> {
        let text = if content_type.contains("html") || content_type.is_empty() {
            html_to_text(body)
        } else if content_type.starts_with("text/")
            || content_type.contains("json")
            || content_type.contains("xml")
        {
            body.to_string()
        } else {
            return None;
        };

        let cleaned = self.cleaner.clean(&text, self.max_content_length);
        (cleaned.chars().count() >= self.min_content_length).then_some(cleaned)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<String>, WebError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(WebError::InvalidUrl {
                url: url.to_string(),
            });
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(url, %status, "fetch returned non-success status");
            return Ok(None);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.starts_with("image/")
            || content_type.starts_with("video/")
            || content_type.starts_with("audio/")
            || content_type.contains("pdf")
            || content_type.contains("octet-stream")
        {
            debug!(url, content_type, "skipping non-text content");
            return Ok(None);
        }

        let body = response.text().await.map_err(|e| WebError::Decode {
            message: e.to_string(),
        })?;
        Ok(self.extract(&content_type, &body))
    }
}
