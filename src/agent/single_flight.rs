//! Single-flight gate for completion providers.
//!
//! Locally hosted models serve one request at a time; concurrent calls
//! either queue invisibly inside the server or fail. [`SingleFlight`]
//! makes the exclusion explicit with a one-permit semaphore so that every
//! agent (and every concurrent research run sharing the provider) waits
//! its turn on our side of the wire.

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::debug;

use super::message::{ChatRequest, ChatResponse};
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Wraps a provider so at most one completion is in flight at a time.
pub struct SingleFlight<P: ?Sized> {
    gate: Semaphore,
    inner: Box<P>,
}

impl<P: LlmProvider + ?Sized> SingleFlight<P> {
    /// Wraps `inner` behind a one-permit gate.
    #[must_use]
    pub fn new(inner: Box<P>) -> Self {
        Self {
            gate: Semaphore::new(1),
            inner,
        }
    }
}

#[async_trait]
impl<P: LlmProvider + ?Sized> LlmProvider for SingleFlight<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| AgentError::Orchestration {
                message: format!("completion gate closed: {e}"),
            })?;
        debug!(model = %request.model, "completion slot acquired");
        self.inner.chat(request).await
    }
}

impl<P: ?Sized> std::fmt::Debug for SingleFlight<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("available", &self.gate.available_permits())
            .finish_non_exhaustive()
    }
}
