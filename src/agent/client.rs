//! Provider registry and factory.
//!
//! Maps provider names to concrete [`LlmProvider`] implementations.

use std::sync::Arc;

use crate::agent::config::ResearchConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::{OllamaProvider, OpenAiProvider};
use crate::agent::single_flight::SingleFlight;
use crate::error::AgentError;

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"ollama"` (default): native Ollama chat API
/// - `"openai"`: `OpenAI`-compatible APIs via `async-openai`
///
/// When `config.single_flight` is set the provider is wrapped in
/// [`SingleFlight`], so every completion waits for the previous one.
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(config: &ResearchConfig) -> Result<Arc<dyn LlmProvider>, AgentError> {
    let provider: Box<dyn LlmProvider> = match config.provider.as_str() {
        "ollama" => Box::new(OllamaProvider::new(config)?),
        "openai" => Box::new(OpenAiProvider::new(config)),
        other => {
            return Err(AgentError::UnsupportedProvider {
                name: other.to_string(),
            });
        }
    };

    if config.single_flight {
        Ok(Arc::new(SingleFlight::new(provider)))
    } else {
        Ok(Arc::from(provider))
    }
}
