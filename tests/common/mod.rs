//! Deterministic capabilities for driving the engine end to end.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deep_research::agent::{
    ChatRequest, ChatResponse, LlmProvider, Orchestrator, ProgressEvent, PromptSet,
    ResearchConfig,
};
use deep_research::error::{AgentError, WebError};
use deep_research::web::{Fetcher, SearchHit, Searcher};

/// Prompt kinds, keyed by the tag each prompt opens with.
pub const PLAN: &str = "<plan>";
pub const EXTRACT: &str = "<extract>";
pub const EVALUATE_TASK: &str = "<evaluate_task>";
pub const GAP: &str = "<gap_analysis>";
pub const EVALUATE_FINAL: &str = "<evaluate_final>";
pub const FINAL_GAP: &str = "<final_gap_analysis>";
pub const WRITE: &str = "<write>";

const KINDS: [&str; 7] = [PLAN, EXTRACT, EVALUATE_TASK, GAP, EVALUATE_FINAL, FINAL_GAP, WRITE];

type Handler = dyn Fn(&str, &str) -> Result<String, AgentError> + Send + Sync;

/// Provider routing each prompt to a handler by its opening tag.
///
/// The handler receives the tag and the full prompt.
pub struct RoutedProvider {
    handler: Box<Handler>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl RoutedProvider {
    pub fn new(
        handler: impl Fn(&str, &str) -> Result<String, AgentError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(HashMap::new()),
        })
    }

    pub fn calls(&self, kind: &str) -> usize {
        self.calls
            .lock()
            .map(|c| c.get(kind).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl LlmProvider for RoutedProvider {
    fn name(&self) -> &'static str {
        "routed"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let prompt = request.last_user_content().unwrap_or_default();
        let kind = KINDS
            .iter()
            .copied()
            .find(|k| prompt.starts_with(k))
            .unwrap_or("other");
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(kind).or_insert(0) += 1;
        }
        let content = (self.handler)(kind, prompt)?;
        Ok(ChatResponse {
            content,
            ..ChatResponse::default()
        })
    }
}

/// Returns the text between `open` and `close` in `prompt`.
pub fn between<'a>(prompt: &'a str, open: &str, close: &str) -> &'a str {
    prompt
        .split_once(open)
        .and_then(|(_, rest)| rest.split_once(close))
        .map_or("", |(inner, _)| inner)
}

/// Extraction reply with `n` distinct fragments for the source in `prompt`.
pub fn fragments_reply(prompt: &str, n: usize, relevance: f32) -> String {
    let url = between(prompt, "url=\"", "\"");
    let chunks: Vec<_> = (0..n)
        .map(|i| serde_json::json!({ "content": format!("fact {i} from {url}"), "relevance": relevance }))
        .collect();
    serde_json::json!({ "chunks": chunks }).to_string()
}

pub fn sufficient(yes: bool) -> String {
    serde_json::json!({ "sufficient": yes, "reasoning": "checked" }).to_string()
}

pub fn gap_reply(queries: &[String]) -> String {
    serde_json::json!({ "has_gaps": true, "suggested_queries": queries, "reasoning": "missing" })
        .to_string()
}

pub fn plan_reply(queries: &[&str]) -> String {
    let tasks: Vec<_> = queries
        .iter()
        .enumerate()
        .map(|(i, q)| serde_json::json!({ "query": q, "priority": i + 1 }))
        .collect();
    serde_json::json!({ "tasks": tasks }).to_string()
}

/// Searcher returning `per_query` hits derived from the query, recording every call.
pub struct RecordingSearcher {
    per_query: usize,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl RecordingSearcher {
    pub fn new(per_query: usize, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self { per_query, log })
    }
}

#[async_trait]
impl Searcher for RecordingSearcher {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, WebError> {
        if let Ok(mut log) = self.log.lock() {
            log.push(format!("search:{query}"));
        }
        let slug = query.replace(' ', "-");
        Ok((0..self.per_query.min(count))
            .map(|i| SearchHit {
                title: format!("{query} result {i}"),
                description: format!("Search snippet {i} about {query}"),
                url: format!("https://example.com/{slug}/{i}"),
            })
            .collect())
    }
}

/// Fetcher serving a fixed page body for every URL.
pub struct StaticFetcher {
    pub fetches: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fetches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<String>, WebError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Some(format!(
            "Full article text served for {url}. It discusses storage layouts, \
             query execution and benchmark results in depth."
        )))
    }
}

pub fn config(max_iterations: usize) -> ResearchConfig {
    ResearchConfig::builder()
        .max_iterations(max_iterations)
        .search_count(5)
        .build()
        .unwrap_or_else(|_| unreachable!())
}

/// Builds an orchestrator with compiled-in prompts and an event recorder.
pub fn orchestrator(
    provider: Arc<dyn LlmProvider>,
    searcher: Arc<dyn Searcher>,
    fetcher: Arc<dyn Fetcher>,
    config: ResearchConfig,
) -> (Orchestrator, Arc<Mutex<Vec<ProgressEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let orchestrator =
        Orchestrator::with_prompts(provider, searcher, fetcher, config, PromptSet::defaults())
            .with_progress(Arc::new(move |event: &ProgressEvent| {
                if let Ok(mut events) = sink.lock() {
                    events.push(event.clone());
                }
            }));
    (orchestrator, events)
}

pub fn snapshot<T: Clone>(shared: &Mutex<Vec<T>>) -> Vec<T> {
    shared.lock().map(|v| v.clone()).unwrap_or_default()
}
