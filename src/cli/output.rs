//! Output formatting for CLI commands.

use std::fmt::Write;

use serde::Serialize;

use crate::agent::ResearchOutcome;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name, falling back to text for anything unknown.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON with a trailing newline.
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let mut out = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("serialization failed: {e}") }).to_string()
        });
        out.push('\n');
        out
    }
}

/// Renders a research outcome as markdown followed by a stats footer.
#[must_use]
pub fn format_outcome(outcome: &ResearchOutcome) -> String {
    let stats = &outcome.stats;
    let mut out = outcome.document.to_markdown();
    let _ = write!(
        out,
        "\n---\nTasks: {} ({} completed, {} abandoned, {} failed, {} emergency) | \
         Rounds: {}/{} | Fragments: {} | Sources: {} | Time: {:.1}s",
        stats.tasks_total,
        stats.tasks_completed,
        stats.tasks_abandoned,
        stats.tasks_failed,
        stats.emergency_tasks,
        stats.iteration_count,
        stats.max_iterations,
        stats.fragments,
        stats.sources,
        stats.elapsed.as_secs_f64(),
    );
    if stats.cancelled {
        out.push_str(" | cancelled");
    }
    out.push('\n');
    out
}
