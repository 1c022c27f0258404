//! # deep-research-rs
//!
//! An autonomous research engine. A question is decomposed into sub-tasks,
//! each task is driven through rounds of search, fetch, extraction, and
//! critique, and the accumulated evidence is written up as a cited report.
//!
//! The engine depends only on three narrow capabilities, all injectable:
//!
//! - [`LlmProvider`](agent::LlmProvider): text completion for a model id
//!   and a message list.
//! - [`Searcher`](web::Searcher): ranked source candidates for a query.
//! - [`Fetcher`](web::Fetcher): extracted page text for a URL.
//!
//! ```text
//! question → Orchestrator
//!   ├── Planner   (3–7 keyword tasks)
//!   ├── loop, lowest priority first, bounded by max_iterations
//!   │   ├── Hunter  → sources
//!   │   ├── Reader  → concurrent fetch, serialized extraction → fragments
//!   │   └── Critic  → FINISH | CONTINUE(gap queries)
//!   ├── Critic::evaluate_final (one second chance, emergency tasks)
//!   └── Writer    → Document
//! ```

pub mod agent;
pub mod cli;
pub mod error;
pub mod web;

pub use agent::{
    Document, Fragment, Orchestrator, ProgressEvent, ResearchConfig, ResearchContext,
    ResearchOutcome, RunStats, Source, Task, TaskStatus,
};
pub use error::{AgentError, CommandError, Error, Result, WebError};
