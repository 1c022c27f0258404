//! The research engine.
//!
//! Four LLM-backed roles cooperate under one [`Orchestrator`]:
//!
//! ```text
//! question → Orchestrator
//!   ├── PlannerAgent  (question → prioritized tasks)
//!   ├── per round, lowest priority first
//!   │   ├── Hunter       (queries → sources, via Searcher)
//!   │   ├── ReaderAgent  (sources → fragments, via Fetcher + LLM)
//!   │   └── CriticAgent  (fragments → FINISH | CONTINUE + gap queries)
//!   ├── CriticAgent::evaluate_final (may add emergency tasks once)
//!   └── WriterAgent   (fragment pool → Document)
//! ```
//!
//! All shared state lives in a [`ResearchContext`] owned by the
//! orchestrator for the duration of one run.

pub mod client;
pub mod config;
pub mod context;
pub mod critic;
pub mod hunter;
pub mod json;
pub mod message;
pub mod model;
pub mod orchestrator;
pub mod planner;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod reader;
pub mod report;
pub mod single_flight;
pub mod traits;
pub mod writer;

#[cfg(test)]
mod test_support;

// Re-export key types
pub use client::create_provider;
pub use config::{ResearchConfig, ResearchConfigBuilder};
pub use context::ResearchContext;
pub use critic::CriticAgent;
pub use hunter::Hunter;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use model::{Decision, Fragment, GapAnalysis, Priority, RoundVerdict, Source, Task, TaskId, TaskStatus};
pub use orchestrator::Orchestrator;
pub use planner::PlannerAgent;
pub use progress::{ProgressCallback, ProgressEvent};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use reader::{ReaderAgent, Reading};
pub use report::{Document, Reference, ResearchOutcome, RunStats, Section};
pub use single_flight::SingleFlight;
pub use traits::Agent;
pub use writer::WriterAgent;
