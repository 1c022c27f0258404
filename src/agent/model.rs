//! Data types for research tasks, sources, and fragments.
//!
//! A [`Task`] is one focused sub-question. The hunter turns it into
//! [`Source`]s, the reader turns sources into scored [`Fragment`]s, and the
//! critic decides from those fragments whether the task is done.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque task identifier, unique within one research context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a fresh 8-character identifier.
    #[must_use]
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scheduling priority of a task.
///
/// Variant order matters: the derived [`Ord`] places `Emergency` before
/// every `Normal` value, and `Normal` values sort ascending, so the
/// minimum is always the next task to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Gap-filling work spawned by the final evaluation. Preempts the queue.
    Emergency,
    /// Planner priority; lower runs first.
    Normal(u32),
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emergency => f.write_str("emergency"),
            Self::Normal(n) => write!(f, "{n}"),
        }
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet visited.
    Pending,
    /// Visited at least once, gap queries queued.
    InProgress,
    /// Finished by the critic or abandoned.
    Completed,
    /// Hit an unrecoverable internal error.
    Failed,
}

/// Outcome of recording one hunt/read round on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundVerdict {
    /// Evidence is still arriving; ask the critic.
    Evaluate,
    /// Too many fruitless gap rounds; stop working on the task.
    Abandon,
}

/// Critic decision for a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The task's evidence is sufficient.
    Finish,
    /// More evidence is needed.
    Continue,
}

/// One focused sub-question of a research run.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    /// Identifier, unique within the context.
    pub id: TaskId,
    /// Keyword-style search query. Never mutated after creation.
    pub query: String,
    /// Scheduling priority.
    pub priority: Priority,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// Gap queries queued for the next round.
    pub active_queries: Vec<String>,
    /// Every query already dispatched for this task.
    pub attempted_queries: Vec<String>,
    /// Consecutive gap rounds that produced no new fragments.
    pub barren_rounds: u32,
    /// Set when the task was closed without a FINISH decision.
    pub abandoned: bool,
}

impl Task {
    /// Creates a pending task with a fresh identifier.
    #[must_use]
    pub fn new(query: impl Into<String>, priority: Priority) -> Self {
        Self::with_id(TaskId::generate(), query, priority)
    }

    /// Creates a pending task with a given identifier.
    #[must_use]
    pub fn with_id(id: TaskId, query: impl Into<String>, priority: Priority) -> Self {
        Self {
            id,
            query: query.into(),
            priority,
            status: TaskStatus::Pending,
            active_queries: Vec::new(),
            attempted_queries: Vec::new(),
            barren_rounds: 0,
            abandoned: false,
        }
    }

    /// Whether the orchestrator may still schedule work for this task.
    #[must_use]
    pub const fn is_runnable(&self) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::InProgress)
    }

    /// Whether the next round is a gap-filling round rather than the base pass.
    #[must_use]
    pub fn is_gap_round(&self) -> bool {
        !self.attempted_queries.is_empty()
    }

    /// Takes the queries for the next round and marks the task in progress.
    ///
    /// The first round searches the task's own query; later rounds drain
    /// the queued gap queries. Every returned query is recorded as attempted.
    pub fn begin_round(&mut self) -> Vec<String> {
        let queries = if self.is_gap_round() {
            std::mem::take(&mut self.active_queries)
        } else {
            vec![self.query.clone()]
        };
        self.attempted_queries.extend(queries.iter().cloned());
        self.status = TaskStatus::InProgress;
        queries
    }

    /// Records how many new fragments a round produced.
    ///
    /// Base rounds always go to the critic. Gap rounds that add nothing
    /// count towards `max_barren_rounds`; any new fragment resets the count.
    pub fn record_round(
        &mut self,
        gap_round: bool,
        new_fragments: usize,
        max_barren_rounds: u32,
    ) -> RoundVerdict {
        if !gap_round {
            return RoundVerdict::Evaluate;
        }
        if new_fragments > 0 {
            self.barren_rounds = 0;
            return RoundVerdict::Evaluate;
        }
        self.barren_rounds += 1;
        if self.barren_rounds >= max_barren_rounds {
            RoundVerdict::Abandon
        } else {
            RoundVerdict::Evaluate
        }
    }

    /// Queues gap queries that have not been attempted yet.
    ///
    /// Returns the number of queries queued. Zero means the critic has
    /// nothing new to try.
    pub fn queue_gap_queries<I, S>(&mut self, queries: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for query in queries {
            let query = query.as_ref().trim();
            if query.is_empty() {
                continue;
            }
            let seen = self
                .attempted_queries
                .iter()
                .chain(self.active_queries.iter())
                .any(|q| q.eq_ignore_ascii_case(query));
            if !seen {
                self.active_queries.push(query.to_string());
            }
        }
        self.active_queries.len()
    }

    /// Queues the task's own query again, bypassing the attempted filter.
    ///
    /// Already-read URLs are skipped by the hunt, so the retried round
    /// counts as barren unless the search turns up new sources.
    pub fn requeue_own_query(&mut self) -> usize {
        if !self
            .active_queries
            .iter()
            .any(|q| q.eq_ignore_ascii_case(&self.query))
        {
            self.active_queries.push(self.query.clone());
        }
        self.active_queries.len()
    }

    /// Marks the task finished by the critic.
    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.active_queries.clear();
    }

    /// Marks the task completed without a FINISH decision.
    pub fn abandon(&mut self) {
        self.complete();
        self.abandoned = true;
    }

    /// Marks the task failed.
    pub fn fail(&mut self) {
        self.status = TaskStatus::Failed;
        self.active_queries.clear();
    }
}

/// A candidate origin of information for a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    /// Page URL.
    pub url: String,
    /// Search-result title.
    pub title: String,
    /// Search-result snippet, also the fallback payload when fetching fails.
    pub description: String,
    /// Task this source was found for.
    pub task_id: TaskId,
    /// Text the reader extracted from (page text or the description).
    #[serde(skip_serializing)]
    pub fetched_content: Option<String>,
    /// When the reader fetched the page.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Source {
    /// Creates an unfetched source.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        task_id: TaskId,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            description: description.into(),
            task_id,
            fetched_content: None,
            fetched_at: None,
        }
    }
}

/// A scored, extracted piece of content attributed to a source and task.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Extracted text.
    pub content: String,
    /// Relevance to the task query, within `[0, 1]`.
    pub relevance_score: f32,
    /// Extraction timestamp.
    pub extracted_at: DateTime<Utc>,
    /// Task the fragment was extracted for.
    pub task_id: TaskId,
    /// Source the fragment came from.
    pub source: Arc<Source>,
}

/// The critic's diagnosis of what is missing, with follow-up queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapAnalysis {
    /// Whether gaps were found.
    #[serde(default = "default_true")]
    pub has_gaps: bool,
    /// Aspects the evidence does not cover.
    #[serde(default)]
    pub missing_aspects: Vec<String>,
    /// Follow-up search queries.
    #[serde(default)]
    pub suggested_queries: Vec<String>,
    /// Explanation.
    #[serde(default)]
    pub reasoning: String,
    /// The task's own query must be searched again, even though it was
    /// already attempted. Set when the critic could not evaluate at all.
    #[serde(skip)]
    pub resubmit: bool,
}

const fn default_true() -> bool {
    true
}

impl GapAnalysis {
    /// Builds a gap analysis proposing a single query.
    #[must_use]
    pub fn single(missing: &str, query: String, reasoning: impl Into<String>) -> Self {
        Self {
            has_gaps: true,
            missing_aspects: vec![missing.to_string()],
            suggested_queries: vec![query],
            reasoning: reasoning.into(),
            resubmit: false,
        }
    }

    /// Builds a gap analysis that retries `query` as is.
    #[must_use]
    pub fn resubmit(missing: &str, query: String, reasoning: impl Into<String>) -> Self {
        Self {
            resubmit: true,
            ..Self::single(missing, query, reasoning)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Emergency < Priority::Normal(0));
        assert!(Priority::Normal(1) < Priority::Normal(2));
        let mut priorities = vec![Priority::Normal(3), Priority::Emergency, Priority::Normal(1)];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::Emergency, Priority::Normal(1), Priority::Normal(3)]
        );
    }

    #[test]
    fn test_task_id_generate() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_eq!(a.as_str().len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_begin_round_base_then_gap() {
        let mut task = Task::new("rust async runtimes", Priority::Normal(1));
        assert!(!task.is_gap_round());
        assert_eq!(task.begin_round(), vec!["rust async runtimes".to_string()]);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.is_gap_round());

        assert_eq!(task.queue_gap_queries(["tokio scheduler", "smol executor"]), 2);
        let round = task.begin_round();
        assert_eq!(round, vec!["tokio scheduler", "smol executor"]);
        assert!(task.active_queries.is_empty());
        assert_eq!(task.attempted_queries.len(), 3);
    }

    #[test]
    fn test_queue_gap_queries_skips_attempted() {
        let mut task = Task::new("duckdb analytics", Priority::Normal(1));
        let _ = task.begin_round();
        let queued = task.queue_gap_queries(["DuckDB Analytics", "", "duckdb parquet"]);
        assert_eq!(queued, 1);
        assert_eq!(task.active_queries, vec!["duckdb parquet"]);
        assert_eq!(task.queue_gap_queries(["duckdb parquet"]), 1);
    }

    #[test]
    fn test_requeue_own_query_bypasses_attempted() {
        let mut task = Task::new("duckdb analytics", Priority::Normal(1));
        let _ = task.begin_round();
        assert_eq!(task.queue_gap_queries(["duckdb analytics"]), 0);
        assert_eq!(task.requeue_own_query(), 1);
        assert_eq!(task.requeue_own_query(), 1);
        assert!(task.is_gap_round());
        assert_eq!(task.begin_round(), vec!["duckdb analytics"]);
    }

    #[test]
    fn test_record_round_abandons_after_barren_rounds() {
        let mut task = Task::new("q", Priority::Normal(1));
        assert_eq!(task.record_round(false, 0, 2), RoundVerdict::Evaluate);
        assert_eq!(task.record_round(true, 0, 2), RoundVerdict::Evaluate);
        assert_eq!(task.barren_rounds, 1);
        assert_eq!(task.record_round(true, 3, 2), RoundVerdict::Evaluate);
        assert_eq!(task.barren_rounds, 0);
        assert_eq!(task.record_round(true, 0, 2), RoundVerdict::Evaluate);
        assert_eq!(task.record_round(true, 0, 2), RoundVerdict::Abandon);
    }

    #[test]
    fn test_abandon_marks_completed() {
        let mut task = Task::new("q", Priority::Emergency);
        task.active_queries.push("x".to_string());
        task.abandon();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.abandoned);
        assert!(task.active_queries.is_empty());
        assert!(!task.is_runnable());
    }

    #[test]
    fn test_gap_analysis_defaults() {
        let gap: GapAnalysis =
            serde_json::from_str(r#"{"suggested_queries": ["a"]}"#).unwrap_or_default();
        assert!(gap.has_gaps);
        assert_eq!(gap.suggested_queries, vec!["a"]);
        assert!(gap.missing_aspects.is_empty());
        assert!(!gap.resubmit);

        let retry = GapAnalysis::resubmit("evaluation unavailable", "a".to_string(), "timeout");
        assert!(retry.resubmit);
        assert_eq!(retry.suggested_queries, vec!["a"]);
    }
}
