//! Reader agent: turns sources into relevance-scored fragments.
//!
//! Reading happens in two phases. Every source is fetched concurrently on
//! its own tokio task, bounded by a semaphore shared across all reads of
//! one reader. Extraction then runs one source at a time, since the
//! completion backend is single-flight anyway and ordering stays stable.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::config::ResearchConfig;
use super::json::{extract_array, truncate_chars};
use super::model::{Fragment, Source};
use super::prompt::build_reader_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::error::AgentError;
use crate::web::Fetcher;

/// Relevance assigned when the model omits a score, and to fallback fragments.
pub const DEFAULT_RELEVANCE: f32 = 0.5;
/// Characters of payload kept in a fallback fragment.
pub const FALLBACK_FRAGMENT_CHARS: usize = 2000;

/// Sources enriched by one read and the fragments extracted from them.
#[derive(Debug, Default)]
pub struct Reading {
    /// Every source, enriched with the text that was extracted from.
    pub sources: Vec<Arc<Source>>,
    /// Extracted fragments, grouped by source in input order.
    pub fragments: Vec<Fragment>,
}

/// Agent that fetches sources and extracts relevant fragments.
pub struct ReaderAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    fetcher: Arc<dyn Fetcher>,
    fetch_gate: Arc<Semaphore>,
    request_delay: Duration,
    min_content_length: usize,
    min_relevance: f32,
    max_fragments_per_source: usize,
}

impl ReaderAgent {
    /// Creates a reader with its own fetch semaphore.
    #[must_use]
    pub fn new(config: &ResearchConfig, system_prompt: String, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            model: config.reader_model.clone(),
            max_tokens: config.reader_max_tokens,
            system_prompt,
            fetcher,
            fetch_gate: Arc::new(Semaphore::new(config.max_fetch_concurrency)),
            request_delay: config.request_delay,
            min_content_length: config.min_content_length,
            min_relevance: config.min_relevance,
            max_fragments_per_source: config.max_fragments_per_source,
        }
    }

    /// Reads `sources` against `task_query`.
    ///
    /// Never fails and never discards a source: pages that cannot be
    /// fetched are read from their search description instead.
    pub async fn read(
        &self,
        provider: &dyn LlmProvider,
        sources: Vec<Source>,
        task_query: &str,
    ) -> Reading {
        if sources.is_empty() {
            return Reading::default();
        }

        info!(sources = sources.len(), "fetching pages");
        let enriched = self.fetch_all(sources).await;

        let mut reading = Reading::default();
        for source in enriched {
            let fragments = self.extract(provider, &source, task_query).await;
            debug!(url = %source.url, fragments = fragments.len(), "extracted");
            reading.fragments.extend(fragments);
            reading.sources.push(source);
        }

        info!(fragments = reading.fragments.len(), sources = reading.sources.len(), "read completed");
        reading
    }

    async fn fetch_all(&self, sources: Vec<Source>) -> Vec<Arc<Source>> {
        let mut handles = Vec::with_capacity(sources.len());
        for source in &sources {
            let gate = Arc::clone(&self.fetch_gate);
            let fetcher = Arc::clone(&self.fetcher);
            let url = source.url.clone();
            let request_delay = self.request_delay;

            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire().await.map_err(|e| AgentError::Orchestration {
                    message: format!("fetch gate closed: {e}"),
                })?;
                if !request_delay.is_zero() {
                    tokio::time::sleep(request_delay).await;
                }
                fetcher.fetch(&url).await.map_err(|e| AgentError::Orchestration {
                    message: e.to_string(),
                })
            }));
        }

        let results = join_all(handles).await;
        let mut enriched = Vec::with_capacity(sources.len());
        for (mut source, result) in sources.into_iter().zip(results) {
            let fetched = match result {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    warn!(url = %source.url, error = %e, "fetch failed");
                    None
                }
                Err(e) => {
                    warn!(url = %source.url, error = %e, "fetch task join failed");
                    None
                }
            };

            let content = fetched
                .filter(|text| text.trim().chars().count() >= self.min_content_length)
                .unwrap_or_else(|| {
                    debug!(url = %source.url, "using description fallback");
                    source.description.clone()
                });
            source.fetched_content = Some(content);
            source.fetched_at = Some(Utc::now());
            enriched.push(Arc::new(source));
        }
        enriched
    }

    async fn extract(
        &self,
        provider: &dyn LlmProvider,
        source: &Arc<Source>,
        task_query: &str,
    ) -> Vec<Fragment> {
        let payload = source.fetched_content.as_deref().unwrap_or_default();
        if payload.trim().is_empty() {
            return Vec::new();
        }

        let parsed = match self
            .execute(provider, &build_reader_prompt(task_query, source, payload))
            .await
        {
            Ok(response) => self.parse_fragments(&response.content),
            Err(e) => {
                warn!(url = %source.url, error = %e, "extraction call failed");
                None
            }
        };

        match parsed {
            Some(scored) => scored
                .into_iter()
                .map(|(content, relevance_score)| Fragment {
                    content,
                    relevance_score,
                    extracted_at: Utc::now(),
                    task_id: source.task_id.clone(),
                    source: Arc::clone(source),
                })
                .collect(),
            None => vec![Fragment {
                content: truncate_chars(payload, FALLBACK_FRAGMENT_CHARS).to_string(),
                relevance_score: DEFAULT_RELEVANCE,
                extracted_at: Utc::now(),
                task_id: source.task_id.clone(),
                source: Arc::clone(source),
            }],
        }
    }

    /// Parses an extraction reply into `(content, relevance)` pairs.
    ///
    /// Returns `None` when the reply carries no recognizable array. The
    /// result is filtered by `min_relevance`, sorted by relevance, and
    /// capped at `max_fragments_per_source`.
    fn parse_fragments(&self, content: &str) -> Option<Vec<(String, f32)>> {
        let items = extract_array(content, &["chunks", "fragments"])?;

        let mut scored: Vec<(String, f32)> = items
            .iter()
            .filter_map(|item| {
                let text = item.get("content").and_then(Value::as_str)?.trim();
                if text.is_empty() {
                    return None;
                }
                #[allow(clippy::cast_possible_truncation)]
                let relevance = item
                    .get("relevance")
                    .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
                    .map_or(DEFAULT_RELEVANCE, |r| r as f32)
                    .clamp(0.0, 1.0);
                Some((text.to_string(), relevance))
            })
            .filter(|(_, relevance)| *relevance >= self.min_relevance)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(self.max_fragments_per_source);
        Some(scored)
    }
}

#[async_trait]
impl Agent for ReaderAgent {
    fn name(&self) -> &'static str {
        "reader"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use super::*;
    use crate::agent::model::TaskId;
    use crate::agent::prompt::READER_SYSTEM_PROMPT;
    use crate::agent::test_support::ScriptedProvider;
    use crate::error::WebError;

    struct MapFetcher {
        pages: HashMap<String, String>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MapFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, t)| ((*u).to_string(), (*t).to_string()))
                    .collect(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<Option<String>, WebError> {
            let now = self.in_flight.fetch_add(1, AtomicOrdering::SeqCst) + 1;
            self.peak.fetch_max(now, AtomicOrdering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, AtomicOrdering::SeqCst);
            if url.contains("broken") {
                return Err(WebError::Http {
                    message: "reset".to_string(),
                    status: None,
                });
            }
            Ok(self.pages.get(url).cloned())
        }
    }

    const LONG_PAGE: &str =
        "DuckDB is an in-process analytical database with a columnar, vectorized execution engine.";

    fn reader(fetcher: Arc<dyn Fetcher>, concurrency: usize) -> ReaderAgent {
        let config = ResearchConfig::builder()
            .max_fetch_concurrency(concurrency)
            .build()
            .unwrap_or_else(|_| unreachable!());
        ReaderAgent::new(&config, READER_SYSTEM_PROMPT.to_string(), fetcher)
    }

    fn source(url: &str, description: &str) -> Source {
        Source::new(url, url, description, TaskId::from("t1"))
    }

    #[test]
    fn test_parse_fragments_filters_sorts_and_caps() {
        let r = reader(Arc::new(MapFetcher::new(&[])), 2);
        let reply = r#"{"chunks": [
            {"content": "a", "relevance": 0.75},
            {"content": "b", "relevance": 1.7},
            {"content": "c", "relevance": 0.2},
            {"content": "", "relevance": 0.9},
            {"relevance": 0.9},
            {"content": "d"},
            {"content": "e", "relevance": "0.8"},
            {"content": "f", "relevance": 0.9},
            {"content": "g", "relevance": 0.9},
            {"content": "h", "relevance": 0.95}
        ]}"#;
        let parsed = r.parse_fragments(reply).unwrap_or_default();
        let contents: Vec<_> = parsed.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(contents, vec!["b", "h", "f", "g", "e"]);
        assert!((parsed[0].1 - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_fragments_missing_relevance_below_threshold() {
        let r = reader(Arc::new(MapFetcher::new(&[])), 2);
        let parsed = r.parse_fragments(r#"[{"content": "no score"}]"#);
        assert_eq!(parsed, Some(Vec::new()));
        assert!(r.parse_fragments("not json at all").is_none());
    }

    #[tokio::test]
    async fn test_read_falls_back_to_description() {
        let fetcher = Arc::new(MapFetcher::new(&[("https://short.example", "tiny")]));
        let r = reader(fetcher, 4);
        let provider = ScriptedProvider::fixed(r#"[{"content": "fact", "relevance": 0.9}]"#);

        let reading = r
            .read(
                &provider,
                vec![
                    source("https://short.example", "short description"),
                    source("https://broken.example", "broken description"),
                ],
                "duckdb",
            )
            .await;

        assert_eq!(reading.sources.len(), 2);
        assert_eq!(
            reading.sources[0].fetched_content.as_deref(),
            Some("short description")
        );
        assert_eq!(
            reading.sources[1].fetched_content.as_deref(),
            Some("broken description")
        );
        assert!(reading.sources.iter().all(|s| s.fetched_at.is_some()));
        assert_eq!(reading.fragments.len(), 2);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_read_provider_failure_yields_fallback_fragment() {
        let fetcher = Arc::new(MapFetcher::new(&[("https://duckdb.org", LONG_PAGE)]));
        let r = reader(fetcher, 4);
        let provider = ScriptedProvider::failing();

        let reading = r
            .read(&provider, vec![source("https://duckdb.org", "d")], "duckdb")
            .await;

        assert_eq!(reading.fragments.len(), 1);
        assert_eq!(reading.fragments[0].content, LONG_PAGE);
        assert!((reading.fragments[0].relevance_score - DEFAULT_RELEVANCE).abs() < f32::EPSILON);
        assert_eq!(reading.fragments[0].task_id.as_str(), "t1");
    }

    #[tokio::test]
    async fn test_read_bounds_fetch_concurrency() {
        let pages: Vec<(String, String)> = (0..6)
            .map(|i| (format!("https://{i}.example"), LONG_PAGE.to_string()))
            .collect();
        let page_refs: Vec<(&str, &str)> = pages.iter().map(|(u, t)| (u.as_str(), t.as_str())).collect();
        let fetcher = Arc::new(MapFetcher::new(&page_refs));
        let r = reader(Arc::clone(&fetcher) as Arc<dyn Fetcher>, 2);
        let provider = ScriptedProvider::fixed("[]");

        let sources = pages.iter().map(|(u, _)| source(u, "d")).collect();
        let reading = r.read(&provider, sources, "q").await;

        assert_eq!(reading.sources.len(), 6);
        assert!(reading.fragments.is_empty());
        assert!(fetcher.peak.load(AtomicOrdering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_read_is_idempotent_with_deterministic_provider() {
        let fetcher = Arc::new(MapFetcher::new(&[
            ("https://duckdb.org", LONG_PAGE),
            ("https://sqlite.org", LONG_PAGE),
        ]));
        let r = reader(fetcher, 4);
        let provider = ScriptedProvider::new(|prompt| {
            let url = if prompt.contains("sqlite.org") { "sqlite" } else { "duckdb" };
            Ok(format!(r#"[{{"content": "{url} fact", "relevance": 0.9}}]"#))
        });

        let sources = || {
            vec![
                source("https://duckdb.org", "d"),
                source("https://sqlite.org", "s"),
            ]
        };
        let first = r.read(&provider, sources(), "compare").await;
        let second = r.read(&provider, sources(), "compare").await;

        let key = |reading: &Reading| -> Vec<(String, String)> {
            reading
                .fragments
                .iter()
                .map(|f| (f.source.url.clone(), f.content.clone()))
                .collect()
        };
        assert_eq!(key(&first), key(&second));
        assert_eq!(key(&first).len(), 2);
    }

    #[tokio::test]
    async fn test_read_empty_sources() {
        let r = reader(Arc::new(MapFetcher::new(&[])), 1);
        let provider = ScriptedProvider::failing();
        let reading = r.read(&provider, Vec::new(), "q").await;
        assert!(reading.sources.is_empty());
        assert_eq!(provider.calls(), 0);
    }
}
