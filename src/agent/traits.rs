//! Agent trait definition.
//!
//! The planner, reader, critic, and writer implement this trait, which
//! gives each role a fixed system prompt and model configuration and a
//! uniform way to call the completion provider.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, system_message, user_message};
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Trait implemented by all agents in the system.
///
/// Agents encapsulate one role with a fixed system prompt and model
/// configuration. [`Agent::execute`] runs the agent against a provider;
/// each agent then interprets the reply and absorbs failures on its own.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Executes the agent with the given user message.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on transport failures.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<ChatResponse, AgentError> {
        let request = ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
        };

        provider.chat(&request).await
    }
}
