//! Progress notifications emitted by the orchestrator.
//!
//! Events are informational only; a callback cannot steer the run.

use std::sync::Arc;

use serde::Serialize;

use super::model::{Priority, TaskId, TaskStatus};

/// Callback receiving progress events.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// A milestone in a research run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The planner produced the initial tasks.
    PlanCreated {
        /// Planned queries in priority order.
        queries: Vec<String>,
    },
    /// A hunt/read round started for a task.
    TaskStarted {
        /// Task being worked on.
        task_id: TaskId,
        /// The task's own query.
        query: String,
        /// Task priority.
        priority: Priority,
        /// Queries searched this round.
        round_queries: Vec<String>,
        /// Rounds consumed so far.
        iteration: usize,
        /// Fragments in the pool when the round started.
        pool_size: usize,
    },
    /// A task reached a terminal state.
    TaskCompleted {
        /// Finished task.
        task_id: TaskId,
        /// Terminal status.
        status: TaskStatus,
        /// Whether the task was closed without a FINISH decision.
        abandoned: bool,
        /// Fragments collected for this task.
        fragments: usize,
        /// Fragments in the pool.
        pool_size: usize,
    },
    /// The final evaluation finished.
    FinalCheck {
        /// Emergency tasks added to the queue.
        emergency_tasks: Vec<String>,
        /// Whether the run returns to iterating.
        resumed: bool,
    },
    /// The writer started.
    WritingStarted {
        /// Fragments in the pool.
        fragments: usize,
        /// Sources read.
        sources: usize,
        /// Whether the run was cancelled.
        cancelled: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = ProgressEvent::FinalCheck {
            emergency_tasks: vec!["duckdb cost".to_string()],
            resumed: true,
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["event"], "final_check");
        assert_eq!(json["resumed"], true);
    }
}
