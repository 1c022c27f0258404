//! Research output: the written document and run statistics.

use std::fmt::Write;
use std::time::Duration;

use serde::Serialize;

/// A section of the written report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Section heading, without the leading `##`.
    pub heading: String,
    /// Markdown body.
    pub body: String,
}

/// A numbered source cited in the report as `[n]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// 1-based citation number.
    pub index: usize,
    /// Source title.
    pub title: String,
    /// Source URL.
    pub url: String,
}

/// The final research document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Report title.
    pub title: String,
    /// Body sections in order.
    pub sections: Vec<Section>,
    /// Cited sources.
    pub references: Vec<Reference>,
}

impl Document {
    /// Builds a document from model-written markdown.
    ///
    /// The first `#` line becomes the title (`fallback_title` if there is
    /// none) and every `##` line opens a section. Text before the first
    /// section goes into an "Overview" section. A references section
    /// written by the model is dropped, since the caller attaches the
    /// authoritative list.
    #[must_use]
    pub fn from_markdown(markdown: &str, fallback_title: &str, references: Vec<Reference>) -> Self {
        let mut title: Option<String> = None;
        let mut sections: Vec<Section> = Vec::new();
        let mut heading: Option<String> = None;
        let mut body = String::new();
        let mut in_fence = false;

        for line in markdown.lines() {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
            }
            if !in_fence {
                if let Some(h) = line.strip_prefix("## ") {
                    push_section(heading.take(), &mut body, &mut sections);
                    heading = Some(h.trim().to_string());
                    continue;
                }
                if title.is_none()
                    && heading.is_none()
                    && let Some(t) = line.strip_prefix("# ")
                {
                    title = Some(t.trim().to_string());
                    continue;
                }
            }
            body.push_str(line);
            body.push('\n');
        }
        push_section(heading, &mut body, &mut sections);

        Self {
            title: title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| fallback_title.to_string()),
            sections,
            references,
        }
    }

    /// Whether the document has any body text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.body.trim().is_empty())
    }

    /// Renders the document as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n", self.title);
        for section in &self.sections {
            let _ = write!(out, "\n## {}\n\n{}\n", section.heading, section.body.trim());
        }
        if !self.references.is_empty() {
            out.push_str("\n## References\n\n");
            for r in &self.references {
                let _ = writeln!(out, "[{}] [{}]({})", r.index, r.title, r.url);
            }
        }
        out
    }
}

fn push_section(heading: Option<String>, body: &mut String, sections: &mut Vec<Section>) {
    let text = body.trim().to_string();
    body.clear();
    match heading {
        Some(h) if is_references_heading(&h) => {}
        Some(h) => sections.push(Section { heading: h, body: text }),
        None if !text.is_empty() => sections.push(Section {
            heading: "Overview".to_string(),
            body: text,
        }),
        None => {}
    }
}

fn is_references_heading(heading: &str) -> bool {
    matches!(
        heading.trim().to_ascii_lowercase().as_str(),
        "references" | "sources" | "bibliography" | "citations"
    )
}

/// Statistics for a finished run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Rounds consumed.
    pub iteration_count: usize,
    /// Round budget.
    pub max_iterations: usize,
    /// Tasks created (planned and emergency).
    pub tasks_total: usize,
    /// Tasks finished by the critic.
    pub tasks_completed: usize,
    /// Tasks closed without a FINISH decision.
    pub tasks_abandoned: usize,
    /// Tasks that hit an internal error.
    pub tasks_failed: usize,
    /// Tasks still pending or in progress when the loop stopped.
    pub tasks_unfinished: usize,
    /// Emergency tasks created by the final evaluation.
    pub emergency_tasks: usize,
    /// Fragments in the pool.
    pub fragments: usize,
    /// Sources read.
    pub sources: usize,
    /// Whether the run was cancelled before converging.
    pub cancelled: bool,
    /// Wall-clock time.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

/// Result of a research run.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutcome {
    /// The question that was researched.
    pub question: String,
    /// The written report.
    pub document: Document,
    /// Run statistics.
    pub stats: RunStats,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}
