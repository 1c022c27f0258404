//! Critic agent: decides when a task, and the run, has enough evidence.
//!
//! Per task, the critic either finishes the task or proposes follow-up
//! queries. For the whole run, it may spawn up to three emergency tasks
//! once, before the writer takes over. Every model failure degrades to a
//! conservative fixed answer.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::config::ResearchConfig;
use super::context::ResearchContext;
use super::json::extract_json;
use super::model::{Decision, Fragment, GapAnalysis, Priority, Task, TaskStatus};
use super::prompt::{
    RunSummary, build_evaluate_final_prompt, build_evaluate_task_prompt, build_final_gap_prompt,
    build_gap_prompt,
};
use super::provider::LlmProvider;
use super::traits::Agent;

/// Fragments shown to the per-task evaluation.
pub const MAX_EVALUATED_FRAGMENTS: usize = 20;
/// Fragments sampled for the final evaluation.
pub const FINAL_SAMPLE_SIZE: usize = 5;
/// Gap queries kept per analysis.
pub const MAX_GAP_QUERIES: usize = 3;
/// Emergency tasks created by the final evaluation.
pub const MAX_EMERGENCY_TASKS: usize = 3;

const MORE_DETAILS_SUFFIX: &str = "more details";
const ALTERNATIVE_SOURCES_SUFFIX: &str = "alternative sources";

#[derive(Debug)]
struct Evaluation {
    sufficient: bool,
    reasoning: String,
}

/// Agent that judges evidence sufficiency and analyses gaps.
pub struct CriticAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    min_fragments_per_task: usize,
}

impl CriticAgent {
    /// Creates a new critic with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &ResearchConfig, system_prompt: String) -> Self {
        Self {
            model: config.critic_model.clone(),
            max_tokens: config.critic_max_tokens,
            system_prompt,
            min_fragments_per_task: config.min_fragments_per_task,
        }
    }

    /// Decides whether `task` is done given its fragments.
    ///
    /// A CONTINUE decision always carries a gap analysis with at least
    /// one suggested query.
    pub async fn evaluate_task(
        &self,
        provider: &dyn LlmProvider,
        task: &Task,
        fragments: &[&Fragment],
        question: &str,
    ) -> (Decision, Option<GapAnalysis>) {
        if fragments.len() < self.min_fragments_per_task {
            debug!(task = %task.id, fragments = fragments.len(), "too few fragments, skipping evaluation");
            let gap = GapAnalysis::single(
                "more sources",
                format!("{} {MORE_DETAILS_SUFFIX}", task.query),
                format!("only {} fragments collected", fragments.len()),
            );
            return (Decision::Continue, Some(gap));
        }

        let top = top_by_relevance(fragments, MAX_EVALUATED_FRAGMENTS);
        let prompt = build_evaluate_task_prompt(question, &task.query, &top);

        let evaluation = match self.execute(provider, &prompt).await {
            Ok(response) => parse_evaluation(&response.content),
            Err(e) => {
                warn!(task = %task.id, error = %e, "evaluation call failed, retrying task query");
                let gap = GapAnalysis::resubmit("evaluation unavailable", task.query.clone(), e.to_string());
                return (Decision::Continue, Some(gap));
            }
        };

        let reasoning = match evaluation {
            Some(Evaluation {
                sufficient: true,
                reasoning,
            }) => {
                info!(task = %task.id, reasoning = %reasoning, "task sufficient");
                return (Decision::Finish, None);
            }
            Some(Evaluation { reasoning, .. }) => reasoning,
            None => "evaluation could not be parsed".to_string(),
        };

        let gap = self.analyze_gaps(provider, task, &reasoning).await;
        info!(task = %task.id, queries = ?gap.suggested_queries, "task needs more evidence");
        (Decision::Continue, Some(gap))
    }

    async fn analyze_gaps(&self, provider: &dyn LlmProvider, task: &Task, reasoning: &str) -> GapAnalysis {
        let prompt = build_gap_prompt(&task.query, reasoning, &task.attempted_queries);
        let parsed = match self.execute(provider, &prompt).await {
            Ok(response) => parse_gap(&response.content),
            Err(e) => {
                warn!(task = %task.id, error = %e, "gap analysis call failed");
                None
            }
        };

        let Some(mut gap) = parsed else {
            return alternative_sources(&task.query, reasoning);
        };

        let mut queries: Vec<String> = Vec::new();
        for q in gap.suggested_queries.drain(..) {
            let q = q.trim();
            if !q.is_empty()
                && !q.eq_ignore_ascii_case(task.query.trim())
                && !queries.iter().any(|seen| seen.eq_ignore_ascii_case(q))
            {
                queries.push(q.to_string());
            }
        }
        queries.truncate(MAX_GAP_QUERIES);

        if queries.is_empty() {
            return alternative_sources(&task.query, &gap.reasoning);
        }
        gap.suggested_queries = queries;
        gap.has_gaps = true;
        gap
    }

    /// Judges whether the whole pool answers the original question.
    ///
    /// Returns whether the run should go back to iterating, and the
    /// emergency tasks to run if so.
    pub async fn evaluate_final(
        &self,
        provider: &dyn LlmProvider,
        context: &ResearchContext,
    ) -> (bool, Vec<Task>) {
        let summary = RunSummary {
            fragments: context.fragments().len(),
            completed_tasks: context.count_status(TaskStatus::Completed),
            total_tasks: context.tasks.len(),
            iteration_count: context.iteration_count,
            max_iterations: context.max_iterations,
        };
        let pool: Vec<&Fragment> = context.fragments().iter().collect();
        let sample = top_by_relevance(&pool, FINAL_SAMPLE_SIZE);
        let question = context.original_question();

        let prompt = build_evaluate_final_prompt(question, summary, &sample);
        let evaluation = match self.execute(provider, &prompt).await {
            Ok(response) => parse_evaluation(&response.content),
            Err(e) => {
                warn!(error = %e, "final evaluation call failed");
                return (false, Vec::new());
            }
        };

        let reasoning = match evaluation {
            Some(Evaluation {
                sufficient: true, ..
            }) => {
                info!("final evaluation: evidence sufficient");
                return (false, Vec::new());
            }
            Some(Evaluation { reasoning, .. }) => reasoning,
            None => "final evaluation could not be parsed".to_string(),
        };

        let gap_prompt = build_final_gap_prompt(question, summary, &reasoning);
        let queries = match self.execute(provider, &gap_prompt).await {
            Ok(response) => parse_gap(&response.content).map(|g| g.suggested_queries),
            Err(e) => {
                warn!(error = %e, "final gap analysis call failed");
                None
            }
        }
        .filter(|qs| qs.iter().any(|q| !q.trim().is_empty()))
        .unwrap_or_else(|| vec![question.to_string()]);

        let mut tasks: Vec<Task> = Vec::new();
        for q in queries {
            let q = q.trim();
            let known = context
                .tasks
                .iter()
                .map(|t| t.query.as_str())
                .chain(tasks.iter().map(|t| t.query.as_str()))
                .any(|existing| existing.trim().eq_ignore_ascii_case(q));
            if !q.is_empty() && !known {
                tasks.push(Task::new(q, Priority::Emergency));
            }
            if tasks.len() == MAX_EMERGENCY_TASKS {
                break;
            }
        }

        info!(emergency_tasks = tasks.len(), "final evaluation: evidence insufficient");
        (!tasks.is_empty(), tasks)
    }
}

fn top_by_relevance<'a>(fragments: &[&'a Fragment], n: usize) -> Vec<&'a Fragment> {
    let mut sorted = fragments.to_vec();
    sorted.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
    });
    sorted.truncate(n);
    sorted
}

fn alternative_sources(task_query: &str, reasoning: &str) -> GapAnalysis {
    let query = if task_query.trim_end().ends_with(ALTERNATIVE_SOURCES_SUFFIX) {
        task_query.to_string()
    } else {
        format!("{task_query} {ALTERNATIVE_SOURCES_SUFFIX}")
    };
    GapAnalysis::single("unknown", query, reasoning)
}

fn parse_evaluation(content: &str) -> Option<Evaluation> {
    let value = extract_json(content)?;
    let sufficient = match value.get("sufficient")? {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => return None,
    };
    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(Evaluation {
        sufficient,
        reasoning,
    })
}

fn parse_gap(content: &str) -> Option<GapAnalysis> {
    let value = extract_json(content)?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

#[async_trait]
impl Agent for CriticAgent {
    fn name(&self) -> &'static str {
        "critic"
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

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::agent::model::{Source, TaskId};
    use crate::agent::prompt::CRITIC_SYSTEM_PROMPT;
    use crate::agent::test_support::ScriptedProvider;
    use crate::error::AgentError;

    fn critic() -> CriticAgent {
        let config = ResearchConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        CriticAgent::new(&config, CRITIC_SYSTEM_PROMPT.to_string())
    }

    fn fragments(task: &Task, n: usize) -> Vec<Fragment> {
        (0..n)
            .map(|i| Fragment {
                content: format!("fact {i}"),
                relevance_score: 0.8,
                extracted_at: Utc::now(),
                task_id: task.id.clone(),
                source: Arc::new(Source::new("https://a.example", "A", "", task.id.clone())),
            })
            .collect()
    }

    fn task(query: &str) -> Task {
        Task::with_id(TaskId::from("t1"), query, Priority::Normal(1))
    }

    #[tokio::test]
    async fn test_fast_path_skips_model() {
        let provider = ScriptedProvider::failing();
        let t = task("duckdb");
        let pool = fragments(&t, 1);
        let refs: Vec<&Fragment> = pool.iter().collect();

        let (decision, gap) = critic().evaluate_task(&provider, &t, &refs, "q").await;
        assert_eq!(decision, Decision::Continue);
        assert_eq!(gap.map(|g| g.suggested_queries), Some(vec!["duckdb more details".to_string()]));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_sufficient_finishes() {
        let provider = ScriptedProvider::fixed(r#"{"sufficient": true, "reasoning": "complete"}"#);
        let t = task("duckdb");
        let pool = fragments(&t, 3);
        let refs: Vec<&Fragment> = pool.iter().collect();

        let (decision, gap) = critic().evaluate_task(&provider, &t, &refs, "q").await;
        assert_eq!(decision, Decision::Finish);
        assert!(gap.is_none());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_runs_gap_analysis_and_filters_queries() {
        let provider = ScriptedProvider::new(|prompt| {
            if prompt.starts_with("<evaluate_task>") {
                Ok(r#"{"sufficient": false, "reasoning": "no benchmarks"}"#.to_string())
            } else {
                Ok(r#"{"missing_aspects": ["benchmarks"], "suggested_queries": ["DuckDB", "duckdb tpch benchmark", "duckdb tpch benchmark", "duckdb memory", "duckdb joins"], "reasoning": "r"}"#.to_string())
            }
        });
        let t = task("duckdb");
        let pool = fragments(&t, 3);
        let refs: Vec<&Fragment> = pool.iter().collect();

        let (decision, gap) = critic().evaluate_task(&provider, &t, &refs, "q").await;
        assert_eq!(decision, Decision::Continue);
        let gap = gap.unwrap_or_default();
        assert_eq!(
            gap.suggested_queries,
            vec!["duckdb tpch benchmark", "duckdb memory", "duckdb joins"]
        );
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_unparsable_gap_falls_back_to_alternative_sources() {
        let provider = ScriptedProvider::new(|prompt| {
            if prompt.starts_with("<evaluate_task>") {
                Ok("hmm, hard to say".to_string())
            } else {
                Ok("no idea".to_string())
            }
        });
        let t = task("duckdb");
        let pool = fragments(&t, 2);
        let refs: Vec<&Fragment> = pool.iter().collect();

        let (_, gap) = critic().evaluate_task(&provider, &t, &refs, "q").await;
        assert_eq!(
            gap.map(|g| g.suggested_queries),
            Some(vec!["duckdb alternative sources".to_string()])
        );
    }

    #[test]
    fn test_alternative_sources_not_applied_twice() {
        let gap = alternative_sources("duckdb alternative sources", "r");
        assert_eq!(gap.suggested_queries, vec!["duckdb alternative sources"]);
    }

    #[tokio::test]
    async fn test_failed_evaluation_resubmits_task_query() {
        let provider = ScriptedProvider::failing();
        let t = task("duckdb");
        let pool = fragments(&t, 2);
        let refs: Vec<&Fragment> = pool.iter().collect();

        let (decision, gap) = critic().evaluate_task(&provider, &t, &refs, "q").await;
        assert_eq!(decision, Decision::Continue);
        let gap = gap.unwrap_or_default();
        assert!(gap.resubmit);
        assert_eq!(gap.suggested_queries, vec!["duckdb".to_string()]);
    }

    #[tokio::test]
    async fn test_evaluate_final_sufficient() {
        let provider = ScriptedProvider::fixed(r#"{"sufficient": true}"#);
        let ctx = ResearchContext::new("q", 3);
        let (again, tasks) = critic().evaluate_final(&provider, &ctx).await;
        assert!(!again);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_final_transport_failure() {
        let provider = ScriptedProvider::failing();
        let ctx = ResearchContext::new("q", 3);
        assert_eq!(critic().evaluate_final(&provider, &ctx).await.1.len(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_final_builds_deduplicated_emergency_tasks() {
        let provider = ScriptedProvider::new(|prompt| {
            if prompt.starts_with("<evaluate_final>") {
                Ok(r#"{"sufficient": false, "reasoning": "missing cost"}"#.to_string())
            } else {
                Ok(r#"{"suggested_queries": ["SQLITE analytics", "duckdb cost", "Duckdb Cost", "sqlite cost", "licensing", "extra"]}"#.to_string())
            }
        });
        let mut ctx = ResearchContext::new("Compare SQLite and DuckDB", 3);
        ctx.extend_tasks([task("sqlite analytics")]);

        let (again, tasks) = critic().evaluate_final(&provider, &ctx).await;
        assert!(again);
        let queries: Vec<_> = tasks.iter().map(|t| t.query.as_str()).collect();
        assert_eq!(queries, vec!["duckdb cost", "sqlite cost", "licensing"]);
        assert!(tasks.iter().all(|t| t.priority == Priority::Emergency));
    }

    #[tokio::test]
    async fn test_evaluate_final_gap_failure_uses_question() {
        let provider = ScriptedProvider::new(|prompt| {
            if prompt.starts_with("<evaluate_final>") {
                Ok(r#"{"sufficient": false}"#.to_string())
            } else {
                Err(AgentError::ApiRequest {
                    message: "timeout".to_string(),
                    status: None,
                })
            }
        });
        let ctx = ResearchContext::new("Compare SQLite and DuckDB", 3);
        let (again, tasks) = critic().evaluate_final(&provider, &ctx).await;
        assert!(again);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].query, "Compare SQLite and DuckDB");
    }

    #[test]
    fn test_parse_evaluation_variants() {
        assert!(parse_evaluation(r#"{"sufficient": "TRUE"}"#).is_some_and(|e| e.sufficient));
        assert!(parse_evaluation(r#"{"reasoning": "x"}"#).is_none());
        assert!(parse_evaluation("[1]").is_none());
    }
}
