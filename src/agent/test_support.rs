//! Deterministic doubles shared by the agent unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use super::provider::LlmProvider;
use crate::error::AgentError;

type Reply = dyn Fn(&str) -> Result<String, AgentError> + Send + Sync;

/// Provider that answers from a closure over the last user message.
pub struct ScriptedProvider {
    reply: Box<Reply>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(reply: impl Fn(&str) -> Result<String, AgentError> + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(reply),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always replies with `content`.
    pub fn fixed(content: &str) -> Self {
        let content = content.to_string();
        Self::new(move |_| Ok(content.clone()))
    }

    /// Always fails with a transport error.
    pub fn failing() -> Self {
        Self::new(|_| {
            Err(AgentError::ApiRequest {
                message: "connection refused".to_string(),
                status: None,
            })
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = (self.reply)(request.last_user_content().unwrap_or_default())?;
        Ok(ChatResponse {
            content,
            ..ChatResponse::default()
        })
    }
}
