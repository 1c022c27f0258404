//! Planner agent.
//!
//! Decomposes the research question into 3-7 keyword search tasks. Planning
//! never fails the run: any provider or parse failure degrades to a single
//! task that searches the question verbatim.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::config::ResearchConfig;
use super::json::extract_array;
use super::model::{Priority, Task};
use super::prompt::build_planner_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;

/// Upper bound on planned tasks.
pub const MAX_PLANNED_TASKS: usize = 7;

/// Agent that splits a question into prioritized sub-tasks.
pub struct PlannerAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl PlannerAgent {
    /// Creates a new planner with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &ResearchConfig, system_prompt: String) -> Self {
        Self {
            model: config.planner_model.clone(),
            max_tokens: config.planner_max_tokens,
            system_prompt,
        }
    }

    /// Plans the research tasks for `question`.
    pub async fn plan(&self, provider: &dyn LlmProvider, question: &str) -> Vec<Task> {
        let tasks = match self.execute(provider, &build_planner_prompt(question)).await {
            Ok(response) => Self::parse_tasks(&response.content),
            Err(e) => {
                warn!(error = %e, "planner call failed, using the question as the only task");
                Vec::new()
            }
        };

        if tasks.is_empty() {
            debug!("planner produced no usable tasks");
            return vec![Task::new(question, Priority::Normal(1))];
        }
        tasks
    }

    /// Parses planner output into tasks.
    ///
    /// Accepts a bare array or an object with a `tasks` array. Each entry
    /// may be an object with `query` and optional `priority`, or a plain
    /// string. A missing priority defaults to the entry's 1-based position.
    fn parse_tasks(content: &str) -> Vec<Task> {
        let Some(items) = extract_array(content, &["tasks"]) else {
            return Vec::new();
        };

        items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| {
                let (query, priority) = match item {
                    Value::String(s) => (s.as_str(), None),
                    Value::Object(map) => (
                        map.get("query").and_then(Value::as_str)?,
                        map.get("priority").and_then(Value::as_u64),
                    ),
                    _ => return None,
                };
                let query = query.trim();
                if query.is_empty() {
                    return None;
                }
                let position = u64::try_from(idx + 1).unwrap_or(u64::MAX);
                let priority = u32::try_from(priority.unwrap_or(position)).unwrap_or(u32::MAX);
                Some(Task::new(query, Priority::Normal(priority)))
            })
            .take(MAX_PLANNED_TASKS)
            .collect()
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &'static str {
        "planner"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn temperature(&self) -> f32 {
        0.3
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
