//! Research context: the root aggregate of one run.
//!
//! Holds the immutable question, the task list, the iteration budget, and
//! the flat, append-only fragment pool. Only the orchestrator mutates it.

use std::collections::HashSet;
use std::sync::Arc;

use super::model::{Fragment, Source, Task, TaskId, TaskStatus};

/// State of a single research run.
#[derive(Debug)]
pub struct ResearchContext {
    original_question: String,
    /// Tasks in insertion order.
    pub tasks: Vec<Task>,
    /// Round budget.
    pub max_iterations: usize,
    /// Rounds consumed so far. Never exceeds `max_iterations`.
    pub iteration_count: usize,
    sources: Vec<Arc<Source>>,
    fragments: Vec<Fragment>,
}

impl ResearchContext {
    /// Creates an empty context for `question`.
    #[must_use]
    pub fn new(question: impl Into<String>, max_iterations: usize) -> Self {
        Self {
            original_question: question.into(),
            tasks: Vec::new(),
            max_iterations,
            iteration_count: 0,
            sources: Vec::new(),
            fragments: Vec::new(),
        }
    }

    /// The question this run answers.
    #[must_use]
    pub fn original_question(&self) -> &str {
        &self.original_question
    }

    /// Whether another CONTINUE round fits in the budget.
    #[must_use]
    pub const fn has_budget(&self) -> bool {
        self.iteration_count < self.max_iterations
    }

    /// Consumes one round of budget. Saturates at `max_iterations`.
    pub fn consume_iteration(&mut self) {
        if self.has_budget() {
            self.iteration_count += 1;
        }
    }

    /// Index of the next task to run: lowest priority, then insertion order.
    #[must_use]
    pub fn next_task_index(&self) -> Option<usize> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.is_runnable())
            .min_by_key(|(idx, task)| (task.priority, *idx))
            .map(|(idx, _)| idx)
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Appends tasks to the queue.
    pub fn extend_tasks(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks.extend(tasks);
    }

    /// Every source the reader enriched, in read order.
    #[must_use]
    pub fn sources(&self) -> &[Arc<Source>] {
        &self.sources
    }

    /// The flat fragment pool, in append order.
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Fragments extracted for one task.
    pub fn fragments_for<'a>(&'a self, task_id: &'a TaskId) -> impl Iterator<Item = &'a Fragment> {
        self.fragments.iter().filter(move |f| &f.task_id == task_id)
    }

    /// Whether a source with this URL was already read for the task.
    #[must_use]
    pub fn has_read(&self, task_id: &TaskId, url: &str) -> bool {
        self.sources
            .iter()
            .any(|s| &s.task_id == task_id && s.url == url)
    }

    /// Records sources the reader enriched.
    pub fn record_sources(&mut self, sources: impl IntoIterator<Item = Arc<Source>>) {
        self.sources.extend(sources);
    }

    /// Appends fragments that the task does not already hold.
    ///
    /// Duplicates are detected by trimmed content within the same task.
    /// Returns the number of fragments actually appended; the pool never
    /// shrinks.
    pub fn append_fragments(&mut self, task_id: &TaskId, fragments: Vec<Fragment>) -> usize {
        let mut seen: HashSet<String> = self
            .fragments_for(task_id)
            .map(|f| f.content.trim().to_string())
            .collect();

        let before = self.fragments.len();
        for fragment in fragments {
            if seen.insert(fragment.content.trim().to_string()) {
                self.fragments.push(fragment);
            }
        }
        self.fragments.len() - before
    }

    /// Number of tasks in `status`.
    #[must_use]
    pub fn count_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }
}
