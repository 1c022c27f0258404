//! Ollama provider using the native `/api/chat` endpoint.
//!
//! The native endpoint honours `format: "json"` as a hard constraint on
//! the output grammar, which small local models need far more than the
//! hint the `OpenAI`-compatible endpoint gives them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::agent::config::ResearchConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::error::AgentError;

/// Default local Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessage>,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

/// Provider talking to a local (or remote) Ollama server.
#[derive(Debug)]
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
}

impl OllamaProvider {
    /// Creates a provider from research configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] if the HTTP client cannot be built.
    pub fn new(config: &ResearchConfig) -> Result<Self, AgentError> {
        let base = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_OLLAMA_URL)
            .trim_end_matches('/');
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AgentError::InvalidConfig {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{base}/api/chat"),
        })
    }

    fn build_request(request: &ChatRequest) -> OllamaRequest<'_> {
        OllamaRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            format: request.json_mode.then_some("json"),
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let body = Self::build_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::ApiRequest {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::ApiRequest {
                message: format!("ollama returned {status}: {text}"),
                status: Some(status.as_u16()),
            });
        }

        let raw = response.text().await.map_err(|e| AgentError::ApiRequest {
            message: e.to_string(),
            status: None,
        })?;
        let parsed: OllamaResponse =
            serde_json::from_str(&raw).map_err(|e| AgentError::ResponseParse {
                message: e.to_string(),
                content: raw.clone(),
            })?;

        Ok(ChatResponse {
            content: parsed.message.map(|m| m.content).unwrap_or_default(),
            usage: TokenUsage {
                prompt_tokens: parsed.prompt_eval_count,
                completion_tokens: parsed.eval_count,
                total_tokens: parsed.prompt_eval_count + parsed.eval_count,
            },
            finish_reason: parsed.done_reason,
        })
    }
}
