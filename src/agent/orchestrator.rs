//! Orchestrator for the research loop.
//!
//! Owns the [`ResearchContext`] for one run and drives it through
//! planning → iterating → final check → writing. Iterating works one task
//! at a time, lowest priority first: hunt, read, append, then let the
//! critic decide. Every CONTINUE consumes one round of the budget, and
//! fruitless gap rounds abandon the task, so every run terminates.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::ResearchConfig;
use super::context::ResearchContext;
use super::critic::CriticAgent;
use super::hunter::Hunter;
use super::model::{Decision, Fragment, Priority, RoundVerdict, TaskStatus};
use super::planner::PlannerAgent;
use super::progress::{ProgressCallback, ProgressEvent};
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::reader::ReaderAgent;
use super::report::{ResearchOutcome, RunStats};
use super::writer::WriterAgent;
use crate::error::AgentError;
use crate::web::{Fetcher, Searcher};

/// Maximum accepted question length in bytes.
const MAX_QUESTION_LEN: usize = 10_000;

/// Drives research runs against injected capabilities.
///
/// One orchestrator can serve several runs; each call to
/// [`Orchestrator::research`] gets its own context.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    searcher: Arc<dyn Searcher>,
    config: ResearchConfig,
    planner: PlannerAgent,
    reader: ReaderAgent,
    critic: CriticAgent,
    writer: WriterAgent,
    progress: Option<ProgressCallback>,
    cancel: Option<CancellationToken>,
}

impl Orchestrator {
    /// Creates an orchestrator over the given capabilities.
    ///
    /// Loads prompt templates from [`ResearchConfig::prompt_dir`], falling
    /// back to compiled-in defaults.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        searcher: Arc<dyn Searcher>,
        fetcher: Arc<dyn Fetcher>,
        config: ResearchConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self::with_prompts(provider, searcher, fetcher, config, prompts)
    }

    /// Creates an orchestrator with an explicit prompt set.
    #[must_use]
    pub fn with_prompts(
        provider: Arc<dyn LlmProvider>,
        searcher: Arc<dyn Searcher>,
        fetcher: Arc<dyn Fetcher>,
        config: ResearchConfig,
        prompts: PromptSet,
    ) -> Self {
        Self {
            planner: PlannerAgent::new(&config, prompts.planner),
            reader: ReaderAgent::new(&config, prompts.reader, fetcher),
            critic: CriticAgent::new(&config, prompts.critic),
            writer: WriterAgent::new(&config, prompts.writer),
            provider,
            searcher,
            config,
            progress: None,
            cancel: None,
        }
    }

    /// Registers a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Registers a cancellation token.
    ///
    /// When it fires, the run stops scheduling work and writes the report
    /// from whatever evidence has been gathered.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Researches `question` and returns the written report.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] if the question is empty or
    /// longer than 10,000 bytes. Nothing after validation fails the run.
    pub async fn research(&self, question: &str) -> Result<ResearchOutcome, AgentError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::Orchestration {
                message: "Question cannot be empty".to_string(),
            });
        }
        if question.len() > MAX_QUESTION_LEN {
            return Err(AgentError::Orchestration {
                message: format!(
                    "Question exceeds maximum length ({} bytes, max {MAX_QUESTION_LEN})",
                    question.len()
                ),
            });
        }

        let start = Instant::now();
        let mut ctx = ResearchContext::new(question, self.config.max_iterations);
        let provider = self.provider.as_ref();

        info!(question, max_iterations = ctx.max_iterations, "research started");

        // Planning
        let tasks = self.planner.plan(provider, question).await;
        ctx.extend_tasks(tasks);
        let mut planned: Vec<_> = ctx.tasks.iter().collect();
        planned.sort_by_key(|t| t.priority);
        self.emit(&ProgressEvent::PlanCreated {
            queries: planned.iter().map(|t| t.query.clone()).collect(),
        });
        info!(tasks = ctx.tasks.len(), "plan created");

        // Iterating, with at most one return after the final check
        let mut final_checked = false;
        loop {
            self.iterate(&mut ctx).await;

            if self.is_cancelled() || final_checked {
                break;
            }
            final_checked = true;

            let (should_continue, extra) = self.critic.evaluate_final(provider, &ctx).await;
            let resumed = should_continue && !extra.is_empty() && ctx.has_budget() && !self.is_cancelled();
            self.emit(&ProgressEvent::FinalCheck {
                emergency_tasks: extra.iter().map(|t| t.query.clone()).collect(),
                resumed,
            });
            if !resumed {
                break;
            }
            info!(emergency_tasks = extra.len(), "final check spawned emergency tasks");
            ctx.extend_tasks(extra);
        }

        // Writing
        let cancelled = self.is_cancelled();
        if cancelled {
            warn!("research cancelled, writing report from gathered evidence");
        }
        self.emit(&ProgressEvent::WritingStarted {
            fragments: ctx.fragments().len(),
            sources: ctx.sources().len(),
            cancelled,
        });
        let document = self.writer.write(provider, &ctx).await;

        let stats = collect_stats(&ctx, cancelled, start);
        info!(
            iterations = stats.iteration_count,
            fragments = stats.fragments,
            sources = stats.sources,
            elapsed_ms = stats.elapsed.as_millis(),
            "research finished"
        );

        Ok(ResearchOutcome {
            question: question.to_string(),
            document,
            stats,
        })
    }

    async fn iterate(&self, ctx: &mut ResearchContext) {
        while ctx.has_budget() && !self.is_cancelled() {
            let Some(idx) = ctx.next_task_index() else {
                debug!("no runnable tasks left");
                break;
            };
            if let Err(e) = self.run_round(ctx, idx).await {
                warn!(error = %e, "round failed, marking task failed");
                if let Some(task) = ctx.tasks.get_mut(idx) {
                    task.fail();
                    let event = self.completed_event(ctx, idx);
                    self.emit(&event);
                }
            }
        }
    }

    /// Runs one hunt/read/critique round on the task at `idx`.
    async fn run_round(&self, ctx: &mut ResearchContext, idx: usize) -> Result<(), AgentError> {
        let provider = self.provider.as_ref();
        let task = ctx.tasks.get_mut(idx).ok_or_else(|| AgentError::Orchestration {
            message: format!("task index {idx} out of range"),
        })?;

        let gap_round = task.is_gap_round();
        let queries = task.begin_round();
        let task_id = task.id.clone();
        let task_query = task.query.clone();
        let priority = task.priority;

        self.emit(&ProgressEvent::TaskStarted {
            task_id: task_id.clone(),
            query: task_query.clone(),
            priority,
            round_queries: queries.clone(),
            iteration: ctx.iteration_count,
            pool_size: ctx.fragments().len(),
        });
        debug!(task = %task_id, gap_round, queries = ?queries, "round started");

        if queries.is_empty() {
            self.close_task(ctx, idx, true);
            return Ok(());
        }

        // Hunt, skipping URLs already read for this task
        let hunter = Hunter::new(self.searcher.as_ref(), self.config.search_count);
        let mut seen = HashSet::new();
        let mut sources = Vec::new();
        for query in &queries {
            for source in hunter.hunt(&task_id, query).await {
                if !ctx.has_read(&task_id, &source.url) && seen.insert(source.url.clone()) {
                    sources.push(source);
                }
            }
        }

        // Read and append
        let reading = self.reader.read(provider, sources, &task_query).await;
        ctx.record_sources(reading.sources);
        let added = ctx.append_fragments(&task_id, reading.fragments);
        debug!(task = %task_id, added, pool = ctx.fragments().len(), "fragments appended");

        let verdict = ctx.tasks[idx].record_round(gap_round, added, self.config.max_barren_rounds);
        if verdict == RoundVerdict::Abandon {
            info!(task = %task_id, "no new evidence after repeated gap rounds, abandoning task");
            self.close_task(ctx, idx, true);
            return Ok(());
        }

        // Critique
        let fragments: Vec<&Fragment> = ctx.fragments_for(&task_id).collect();
        let (decision, gap) = self
            .critic
            .evaluate_task(provider, &ctx.tasks[idx], &fragments, ctx.original_question())
            .await;

        match decision {
            Decision::Finish => self.close_task(ctx, idx, false),
            Decision::Continue => {
                ctx.consume_iteration();
                let gap = gap.unwrap_or_default();
                let task = &mut ctx.tasks[idx];
                let queued = if gap.resubmit {
                    task.requeue_own_query()
                } else {
                    task.queue_gap_queries(&gap.suggested_queries)
                };
                if queued == 0 {
                    info!(task = %task_id, "no untried queries left, abandoning task");
                    self.close_task(ctx, idx, true);
                } else {
                    debug!(task = %task_id, queued, iteration = ctx.iteration_count, "gap queries queued");
                }
            }
        }
        Ok(())
    }

    fn close_task(&self, ctx: &mut ResearchContext, idx: usize, abandoned: bool) {
        let task = &mut ctx.tasks[idx];
        if abandoned {
            task.abandon();
        } else {
            task.complete();
        }
        let event = self.completed_event(ctx, idx);
        self.emit(&event);
    }

    fn completed_event(&self, ctx: &ResearchContext, idx: usize) -> ProgressEvent {
        let task = &ctx.tasks[idx];
        ProgressEvent::TaskCompleted {
            task_id: task.id.clone(),
            status: task.status,
            abandoned: task.abandoned,
            fragments: ctx.fragments_for(&task.id).count(),
            pool_size: ctx.fragments().len(),
        }
    }

    fn emit(&self, event: &ProgressEvent) {
        if let Some(callback) = &self.progress {
            callback(event);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

fn collect_stats(ctx: &ResearchContext, cancelled: bool, start: Instant) -> RunStats {
    let tasks = &ctx.tasks;
    RunStats {
        iteration_count: ctx.iteration_count,
        max_iterations: ctx.max_iterations,
        tasks_total: tasks.len(),
        tasks_completed: tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed && !t.abandoned)
            .count(),
        tasks_abandoned: tasks.iter().filter(|t| t.abandoned).count(),
        tasks_failed: ctx.count_status(TaskStatus::Failed),
        tasks_unfinished: tasks.iter().filter(|t| t.is_runnable()).count(),
        emergency_tasks: tasks
            .iter()
            .filter(|t| t.priority == Priority::Emergency)
            .count(),
        fragments: ctx.fragments().len(),
        sources: ctx.sources().len(),
        cancelled,
        elapsed: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::agent::test_support::ScriptedProvider;
    use crate::error::WebError;
    use crate::web::SearchHit;

    struct OneHitSearcher;

    #[async_trait]
    impl Searcher for OneHitSearcher {
        async fn search(&self, query: &str, _count: usize) -> Result<Vec<SearchHit>, WebError> {
            Ok(vec![SearchHit {
                title: query.to_string(),
                description: format!("{query} is described at length in this snippet text."),
                url: format!("https://example.com/{}", query.replace(' ', "-")),
            }])
        }
    }

    struct NoFetch;

    #[async_trait]
    impl Fetcher for NoFetch {
        async fn fetch(&self, _url: &str) -> Result<Option<String>, WebError> {
            Ok(None)
        }
    }

    fn orchestrator(provider: ScriptedProvider, max_iterations: usize) -> Orchestrator {
        let config = ResearchConfig::builder()
            .max_iterations(max_iterations)
            .build()
            .unwrap_or_else(|_| unreachable!());
        Orchestrator::with_prompts(
            Arc::new(provider),
            Arc::new(OneHitSearcher),
            Arc::new(NoFetch),
            config,
            PromptSet::defaults(),
        )
    }

    #[tokio::test]
    async fn test_rejects_empty_and_oversized_questions() {
        let orch = orchestrator(ScriptedProvider::failing(), 1);
        assert!(matches!(orch.research("   ").await, Err(AgentError::Orchestration { .. })));
        let long = "x".repeat(MAX_QUESTION_LEN + 1);
        assert!(orch.research(&long).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_provider_still_writes_document() {
        let orch = orchestrator(ScriptedProvider::failing(), 2);
        let outcome = orch
            .research("what is rust")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(outcome.stats.tasks_total, 1);
        assert!(outcome.stats.iteration_count <= 2);
        assert!(!outcome.document.sections.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_to_writing() {
        let token = CancellationToken::new();
        token.cancel();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let orch = orchestrator(ScriptedProvider::fixed(r#"["a", "b", "c"]"#), 3)
            .with_cancellation(token)
            .with_progress(Arc::new(move |e: &ProgressEvent| {
                if let Ok(mut v) = sink.lock() {
                    v.push(e.clone());
                }
            }));

        let outcome = orch
            .research("what is rust")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(outcome.stats.cancelled);
        assert_eq!(outcome.stats.fragments, 0);
        assert_eq!(outcome.stats.tasks_unfinished, 3);

        let events = events.lock().map(|v| v.clone()).unwrap_or_default();
        assert!(matches!(events.first(), Some(ProgressEvent::PlanCreated { .. })));
        assert!(!events.iter().any(|e| matches!(e, ProgressEvent::TaskStarted { .. })));
        assert!(!events.iter().any(|e| matches!(e, ProgressEvent::FinalCheck { .. })));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::WritingStarted { cancelled: true, .. })
        ));
    }
}
