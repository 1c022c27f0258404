//! Writer agent: turns the fragment pool into the final document.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Write;

use async_trait::async_trait;
use tracing::{info, warn};

use super::config::ResearchConfig;
use super::context::ResearchContext;
use super::json::{strip_think, truncate_chars};
use super::model::Fragment;
use super::prompt::{WRITER_FRAGMENT_CHARS, build_writer_prompt};
use super::provider::LlmProvider;
use super::report::{Document, Reference, Section};
use super::traits::Agent;

/// Fragments handed to the writer.
pub const MAX_WRITER_FRAGMENTS: usize = 40;
/// Fragments listed in the fallback document.
const FALLBACK_FRAGMENTS: usize = 10;

/// Agent that writes the final cited report.
pub struct WriterAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl WriterAgent {
    /// Creates a new writer with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &ResearchConfig, system_prompt: String) -> Self {
        Self {
            model: config.writer_model.clone(),
            max_tokens: config.writer_max_tokens,
            system_prompt,
        }
    }

    /// Writes the report for `context`. Never fails.
    pub async fn write(&self, provider: &dyn LlmProvider, context: &ResearchContext) -> Document {
        let question = context.original_question();
        if context.fragments().is_empty() {
            return no_evidence_document(question);
        }

        let (evidence, references) = number_evidence(context.fragments());
        let prompt = build_writer_prompt(question, &evidence);

        match self.execute(provider, &prompt).await {
            Ok(response) => {
                let markdown = strip_markdown_fence(&strip_think(&response.content));
                let document = Document::from_markdown(&markdown, question, references.clone());
                if !document.is_empty() {
                    info!(sections = document.sections.len(), references = document.references.len(), "report written");
                    return document;
                }
                warn!("writer returned an empty report, using fallback");
            }
            Err(e) => warn!(error = %e, "writer call failed, using fallback"),
        }

        fallback_document(question, &evidence, references)
    }
}

/// Selects the strongest fragments and numbers their sources.
///
/// Fragments are sorted by relevance (stable for ties). Each distinct
/// source URL gets the next reference number on first appearance.
fn number_evidence(pool: &[Fragment]) -> (Vec<(usize, &Fragment)>, Vec<Reference>) {
    let mut sorted: Vec<&Fragment> = pool.iter().collect();
    sorted.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
    });
    sorted.truncate(MAX_WRITER_FRAGMENTS);

    let mut numbers: HashMap<&str, usize> = HashMap::new();
    let mut references = Vec::new();
    let evidence = sorted
        .into_iter()
        .map(|f| {
            let next = numbers.len() + 1;
            let index = *numbers.entry(f.source.url.as_str()).or_insert_with(|| {
                references.push(Reference {
                    index: next,
                    title: if f.source.title.trim().is_empty() {
                        f.source.url.clone()
                    } else {
                        f.source.title.clone()
                    },
                    url: f.source.url.clone(),
                });
                next
            });
            (index, f)
        })
        .collect();
    (evidence, references)
}

fn strip_markdown_fence(text: &str) -> String {
    let trimmed = text.trim();
    for open in ["```markdown", "```md", "```"] {
        if let Some(inner) = trimmed.strip_prefix(open)
            && let Some(inner) = inner.trim_end().strip_suffix("```")
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

fn fallback_document(question: &str, evidence: &[(usize, &Fragment)], mut references: Vec<Reference>) -> Document {
    let listed = &evidence[..evidence.len().min(FALLBACK_FRAGMENTS)];
    references.retain(|r| listed.iter().any(|(index, _)| *index == r.index));

    let mut findings = String::new();
    for (index, f) in listed {
        let _ = writeln!(
            findings,
            "- {} [{index}]",
            truncate_chars(f.content.trim(), WRITER_FRAGMENT_CHARS)
        );
    }

    Document {
        title: question.to_string(),
        sections: vec![
            Section {
                heading: "Summary".to_string(),
                body: "A written synthesis could not be produced. The strongest evidence \
                       gathered is listed below with its sources."
                    .to_string(),
            },
            Section {
                heading: "Key Findings".to_string(),
                body: findings.trim_end().to_string(),
            },
        ],
        references,
    }
}

fn no_evidence_document(question: &str) -> Document {
    Document {
        title: question.to_string(),
        sections: vec![Section {
            heading: "Summary".to_string(),
            body: "No evidence was found for this question. The searches returned no \
                   readable sources, so no answer can be given."
                .to_string(),
        }],
        references: Vec::new(),
    }
}

#[async_trait]
impl Agent for WriterAgent {
    fn name(&self) -> &'static str {
        "writer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.2
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
