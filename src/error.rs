//! Error types for deep-research-rs.
//!
//! Each layer has its own `thiserror` enum. The research loop itself
//! degrades instead of failing, so most [`AgentError`] and [`WebError`]
//! values are logged and absorbed by the component that produced them.

use thiserror::Error;

/// Result alias using the crate-wide [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Agent, provider, or orchestration failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Search or fetch failure.
    #[error(transparent)]
    Web(#[from] WebError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by completion providers and the research agents.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The selected provider needs an API key and none was configured.
    #[error(
        "API key missing: set DEEP_RESEARCH_API_KEY or OPENAI_API_KEY, or point \
         DEEP_RESEARCH_BASE_URL at a local OpenAI-compatible server"
    )]
    ApiKeyMissing,

    /// The provider request failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error description.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// The model's reply could not be parsed into the expected shape.
    #[error("failed to parse model response: {message}")]
    ResponseParse {
        /// Parse diagnostic.
        message: String,
        /// Raw model content.
        content: String,
    },

    /// Unknown provider name in configuration.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// The rejected provider name.
        name: String,
    },

    /// Configuration values are out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What was wrong.
        message: String,
    },

    /// Orchestration failure (input validation, internal bookkeeping).
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Error description.
        message: String,
    },
}

/// Errors raised by the search and fetch capabilities.
#[derive(Debug, Error)]
pub enum WebError {
    /// Transport or HTTP status failure.
    #[error("HTTP error: {message}")]
    Http {
        /// Error description.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// The URL is not an http(s) URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode response: {message}")]
    Decode {
        /// Decode diagnostic.
        message: String,
    },

    /// The search backend kept rate limiting after all retries.
    #[error("rate limited after {retries} retries")]
    RateLimited {
        /// Number of retries attempted.
        retries: u32,
    },
}

impl From<reqwest::Error> for WebError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not complete.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be rendered in the requested format.
    #[error("output format error: {0}")]
    OutputFormat(String),
}
