//! Research configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Default completion backend.
const DEFAULT_PROVIDER: &str = "ollama";
/// Default model for every agent role.
const DEFAULT_MODEL: &str = "llama3.1:8b";
/// Default orchestrator round budget.
const DEFAULT_MAX_ITERATIONS: usize = 5;
/// Default search results requested per query.
const DEFAULT_SEARCH_COUNT: usize = 5;
/// Default minimum relevance for a fragment to be kept.
const DEFAULT_MIN_RELEVANCE: f32 = 0.7;
/// Default fragment count below which the critic skips the model call.
const DEFAULT_MIN_FRAGMENTS_PER_TASK: usize = 2;
/// Default cap on fragments retained per source.
const DEFAULT_MAX_FRAGMENTS_PER_SOURCE: usize = 5;
/// Default consecutive fruitless gap rounds before a task is abandoned.
const DEFAULT_MAX_BARREN_ROUNDS: u32 = 2;
/// Default fetch fan-out.
const DEFAULT_MAX_FETCH_CONCURRENCY: usize = 4;
/// Default minimum fetched text length before falling back to the description.
const DEFAULT_MIN_CONTENT_LENGTH: usize = 50;
/// Default maximum fetched text length kept per page.
const DEFAULT_MAX_CONTENT_LENGTH: usize = 15_000;
/// Default planner max tokens.
const DEFAULT_PLANNER_MAX_TOKENS: u32 = 1024;
/// Default reader (extraction) max tokens.
const DEFAULT_READER_MAX_TOKENS: u32 = 2048;
/// Default critic max tokens.
const DEFAULT_CRITIC_MAX_TOKENS: u32 = 1024;
/// Default writer max tokens.
const DEFAULT_WRITER_MAX_TOKENS: u32 = 4096;
/// Default completion request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Default search and fetch timeout in seconds.
const DEFAULT_WEB_TIMEOUT_SECS: u64 = 15;
/// Default max retries for rate-limited search requests.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default `SearXNG` instance.
const DEFAULT_SEARXNG_URL: &str = "http://localhost:8080";

/// Configuration for a research run.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Completion backend name (`"ollama"` or `"openai"`).
    pub provider: String,
    /// API key for the backend, when it needs one.
    pub api_key: Option<String>,
    /// Optional base URL override (local servers, proxies, compatible APIs).
    pub base_url: Option<String>,
    /// Model for the planner.
    pub planner_model: String,
    /// Model for the reader's extraction calls.
    pub reader_model: String,
    /// Model for the critic.
    pub critic_model: String,
    /// Model for the writer.
    pub writer_model: String,
    /// Maximum tokens for planner responses.
    pub planner_max_tokens: u32,
    /// Maximum tokens for extraction responses.
    pub reader_max_tokens: u32,
    /// Maximum tokens for critic responses.
    pub critic_max_tokens: u32,
    /// Maximum tokens for the written report.
    pub writer_max_tokens: u32,
    /// Completion request timeout.
    pub timeout: Duration,
    /// Search and fetch request timeout.
    pub web_timeout: Duration,
    /// Maximum retry attempts for rate-limited search requests.
    pub max_retries: u32,
    /// Orchestrator round budget. Every CONTINUE decision consumes one round.
    pub max_iterations: usize,
    /// Search results requested per query.
    pub search_count: usize,
    /// Fragments scored below this are discarded.
    pub min_relevance: f32,
    /// Below this many fragments the critic continues without a model call.
    pub min_fragments_per_task: usize,
    /// Fragments retained per source after extraction.
    pub max_fragments_per_source: usize,
    /// Consecutive gap rounds with no new fragments before a task is abandoned.
    pub max_barren_rounds: u32,
    /// Maximum concurrent page fetches.
    pub max_fetch_concurrency: usize,
    /// Fetched text shorter than this falls back to the search description.
    pub min_content_length: usize,
    /// Fetched text longer than this is truncated.
    pub max_content_length: usize,
    /// Delay applied after acquiring a fetch permit.
    ///
    /// Set to `Duration::ZERO` (default) to disable pacing beyond what the
    /// fetch semaphore provides.
    pub request_delay: Duration,
    /// Base URL of the `SearXNG` instance used for search.
    pub searxng_url: String,
    /// Directory containing prompt template files.
    ///
    /// When set, system prompts are loaded from markdown files in this
    /// directory, falling back to compiled-in defaults for any missing file.
    pub prompt_dir: Option<PathBuf>,
    /// Serialize every completion call through a one-permit gate.
    pub single_flight: bool,
}

impl ResearchConfig {
    /// Creates a new builder for `ResearchConfig`.
    #[must_use]
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the resolved values fail validation.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`ResearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct ResearchConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    planner_model: Option<String>,
    reader_model: Option<String>,
    critic_model: Option<String>,
    writer_model: Option<String>,
    writer_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    web_timeout: Option<Duration>,
    max_retries: Option<u32>,
    max_iterations: Option<usize>,
    search_count: Option<usize>,
    min_relevance: Option<f32>,
    min_fragments_per_task: Option<usize>,
    max_fragments_per_source: Option<usize>,
    max_barren_rounds: Option<u32>,
    max_fetch_concurrency: Option<usize>,
    min_content_length: Option<usize>,
    request_delay: Option<Duration>,
    searxng_url: Option<String>,
    prompt_dir: Option<PathBuf>,
    single_flight: Option<bool>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl ResearchConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("DEEP_RESEARCH_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("DEEP_RESEARCH_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("DEEP_RESEARCH_BASE_URL")
                .or_else(|_| std::env::var("OPENAI_BASE_URL"))
                .ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("DEEP_RESEARCH_MODEL").ok();
        }
        if self.planner_model.is_none() {
            self.planner_model = std::env::var("DEEP_RESEARCH_PLANNER_MODEL").ok();
        }
        if self.reader_model.is_none() {
            self.reader_model = std::env::var("DEEP_RESEARCH_READER_MODEL").ok();
        }
        if self.critic_model.is_none() {
            self.critic_model = std::env::var("DEEP_RESEARCH_CRITIC_MODEL").ok();
        }
        if self.writer_model.is_none() {
            self.writer_model = std::env::var("DEEP_RESEARCH_WRITER_MODEL").ok();
        }
        if self.max_iterations.is_none() {
            self.max_iterations = env_parse("DEEP_RESEARCH_MAX_ITERATIONS");
        }
        if self.search_count.is_none() {
            self.search_count = env_parse("DEEP_RESEARCH_SEARCH_COUNT");
        }
        if self.min_relevance.is_none() {
            self.min_relevance = env_parse("DEEP_RESEARCH_MIN_RELEVANCE");
        }
        if self.max_fetch_concurrency.is_none() {
            self.max_fetch_concurrency = env_parse("DEEP_RESEARCH_MAX_FETCH_CONCURRENCY");
        }
        if self.searxng_url.is_none() {
            self.searxng_url = std::env::var("SEARXNG_URL").ok();
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("DEEP_RESEARCH_PROMPT_DIR")
                .ok()
                .map(PathBuf::from);
        }
        self
    }

    /// Sets the completion backend name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model for every role that has no role-specific override.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the planner model.
    #[must_use]
    pub fn planner_model(mut self, model: impl Into<String>) -> Self {
        self.planner_model = Some(model.into());
        self
    }

    /// Sets the reader model.
    #[must_use]
    pub fn reader_model(mut self, model: impl Into<String>) -> Self {
        self.reader_model = Some(model.into());
        self
    }

    /// Sets the critic model.
    #[must_use]
    pub fn critic_model(mut self, model: impl Into<String>) -> Self {
        self.critic_model = Some(model.into());
        self
    }

    /// Sets the writer model.
    #[must_use]
    pub fn writer_model(mut self, model: impl Into<String>) -> Self {
        self.writer_model = Some(model.into());
        self
    }

    /// Sets the writer max tokens.
    #[must_use]
    pub const fn writer_max_tokens(mut self, n: u32) -> Self {
        self.writer_max_tokens = Some(n);
        self
    }

    /// Sets the completion request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the search and fetch timeout.
    #[must_use]
    pub const fn web_timeout(mut self, duration: Duration) -> Self {
        self.web_timeout = Some(duration);
        self
    }

    /// Sets the max retries.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the orchestrator round budget.
    #[must_use]
    pub const fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Sets the number of search results requested per query.
    #[must_use]
    pub const fn search_count(mut self, n: usize) -> Self {
        self.search_count = Some(n);
        self
    }

    /// Sets the minimum fragment relevance.
    #[must_use]
    pub const fn min_relevance(mut self, score: f32) -> Self {
        self.min_relevance = Some(score);
        self
    }

    /// Sets the fragment count below which the critic continues immediately.
    #[must_use]
    pub const fn min_fragments_per_task(mut self, n: usize) -> Self {
        self.min_fragments_per_task = Some(n);
        self
    }

    /// Sets the cap on fragments retained per source.
    #[must_use]
    pub const fn max_fragments_per_source(mut self, n: usize) -> Self {
        self.max_fragments_per_source = Some(n);
        self
    }

    /// Sets the number of fruitless gap rounds tolerated per task.
    #[must_use]
    pub const fn max_barren_rounds(mut self, n: u32) -> Self {
        self.max_barren_rounds = Some(n);
        self
    }

    /// Sets the maximum concurrent page fetches.
    #[must_use]
    pub const fn max_fetch_concurrency(mut self, n: usize) -> Self {
        self.max_fetch_concurrency = Some(n);
        self
    }

    /// Sets the minimum fetched text length.
    #[must_use]
    pub const fn min_content_length(mut self, n: usize) -> Self {
        self.min_content_length = Some(n);
        self
    }

    /// Sets the delay applied after each fetch permit.
    #[must_use]
    pub const fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = Some(delay);
        self
    }

    /// Sets the `SearXNG` base URL.
    #[must_use]
    pub fn searxng_url(mut self, url: impl Into<String>) -> Self {
        self.searxng_url = Some(url.into());
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Enables or disables the single-flight completion gate.
    #[must_use]
    pub const fn single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = Some(enabled);
        self
    }

    /// Builds the [`ResearchConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] when the `openai` provider is
    /// selected without a key or base URL, and [`AgentError::InvalidConfig`]
    /// for out-of-range values.
    pub fn build(self) -> Result<ResearchConfig, AgentError> {
        let provider = self
            .provider
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
            .to_lowercase();

        if provider == "openai" && self.api_key.is_none() && self.base_url.is_none() {
            return Err(AgentError::ApiKeyMissing);
        }

        let max_iterations = self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS);
        if max_iterations == 0 {
            return Err(AgentError::InvalidConfig {
                message: "max_iterations must be at least 1".to_string(),
            });
        }

        let min_relevance = self.min_relevance.unwrap_or(DEFAULT_MIN_RELEVANCE);
        if !(0.0..=1.0).contains(&min_relevance) {
            return Err(AgentError::InvalidConfig {
                message: format!("min_relevance must be within 0.0..=1.0, got {min_relevance}"),
            });
        }

        let max_fetch_concurrency = self
            .max_fetch_concurrency
            .unwrap_or(DEFAULT_MAX_FETCH_CONCURRENCY);
        if max_fetch_concurrency == 0 {
            return Err(AgentError::InvalidConfig {
                message: "max_fetch_concurrency must be at least 1".to_string(),
            });
        }

        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(ResearchConfig {
            provider,
            api_key: self.api_key,
            base_url: self.base_url,
            planner_model: self.planner_model.unwrap_or_else(|| model.clone()),
            reader_model: self.reader_model.unwrap_or_else(|| model.clone()),
            critic_model: self.critic_model.unwrap_or_else(|| model.clone()),
            writer_model: self.writer_model.unwrap_or(model),
            planner_max_tokens: DEFAULT_PLANNER_MAX_TOKENS,
            reader_max_tokens: DEFAULT_READER_MAX_TOKENS,
            critic_max_tokens: DEFAULT_CRITIC_MAX_TOKENS,
            writer_max_tokens: self.writer_max_tokens.unwrap_or(DEFAULT_WRITER_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            web_timeout: self
                .web_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_WEB_TIMEOUT_SECS)),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            max_iterations,
            search_count: self.search_count.unwrap_or(DEFAULT_SEARCH_COUNT).max(1),
            min_relevance,
            min_fragments_per_task: self
                .min_fragments_per_task
                .unwrap_or(DEFAULT_MIN_FRAGMENTS_PER_TASK),
            max_fragments_per_source: self
                .max_fragments_per_source
                .unwrap_or(DEFAULT_MAX_FRAGMENTS_PER_SOURCE)
                .max(1),
            max_barren_rounds: self
                .max_barren_rounds
                .unwrap_or(DEFAULT_MAX_BARREN_ROUNDS)
                .max(1),
            max_fetch_concurrency,
            min_content_length: self
                .min_content_length
                .unwrap_or(DEFAULT_MIN_CONTENT_LENGTH),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            request_delay: self.request_delay.unwrap_or(Duration::ZERO),
            searxng_url: self
                .searxng_url
                .unwrap_or_else(|| DEFAULT_SEARXNG_URL.to_string()),
            prompt_dir: self.prompt_dir,
            single_flight: self.single_flight.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ResearchConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.planner_model, DEFAULT_MODEL);
        assert_eq!(config.writer_model, DEFAULT_MODEL);
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.search_count, DEFAULT_SEARCH_COUNT);
        assert!((config.min_relevance - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.min_fragments_per_task, 2);
        assert_eq!(config.max_fragments_per_source, 5);
        assert_eq!(config.max_barren_rounds, 2);
        assert!(config.single_flight);
    }

    #[test]
    fn test_openai_requires_key_or_base_url() {
        let result = ResearchConfig::builder().provider("openai").build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));

        let local = ResearchConfig::builder()
            .provider("openai")
            .base_url("http://localhost:1234/v1")
            .build();
        assert!(local.is_ok());
    }

    #[test]
    fn test_model_fallback_per_role() {
        let config = ResearchConfig::builder()
            .model("qwen3:8b")
            .writer_model("qwen3:32b")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.planner_model, "qwen3:8b");
        assert_eq!(config.reader_model, "qwen3:8b");
        assert_eq!(config.critic_model, "qwen3:8b");
        assert_eq!(config.writer_model, "qwen3:32b");
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let result = ResearchConfig::builder().max_iterations(0).build();
        assert!(matches!(result, Err(AgentError::InvalidConfig { .. })));
    }

    #[test]
    fn test_rejects_out_of_range_relevance() {
        let result = ResearchConfig::builder().min_relevance(1.5).build();
        assert!(matches!(result, Err(AgentError::InvalidConfig { .. })));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = ResearchConfig::builder()
            .provider("OpenAI")
            .api_key("key")
            .max_iterations(2)
            .search_count(8)
            .max_fetch_concurrency(2)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key.as_deref(), Some("key"));
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.search_count, 8);
        assert_eq!(config.max_fetch_concurrency, 2);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
