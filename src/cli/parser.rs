//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// deep-research: autonomous web research with cited reports.
///
/// Plans sub-tasks for a question, searches and reads web sources for
/// each, critiques coverage until it is sufficient, and writes a markdown
/// report with numbered references.
#[derive(Parser, Debug)]
#[command(name = "deep-research")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a question and print the cited report.
    ///
    /// Requires a reachable `SearXNG` instance and a completion backend
    /// (Ollama by default). Ctrl-C stops scheduling new work and writes
    /// the report from the evidence gathered so far.
    #[command(after_help = r#"Examples:
  deep-research research "Compare SQLite and DuckDB for analytics"
  deep-research research "State of WASI preview 2" --max-iterations 8
  deep-research research "Rust async runtimes" --model qwen3:8b --output report.md
  deep-research research "GPU pricing trends" --provider openai --model gpt-4o-mini
  deep-research --format json research "CRDT libraries" | jq '.stats'
"#)]
    Research(ResearchArgs),

    /// Write the default prompt templates to a directory.
    ///
    /// Existing files are left untouched. Edit the written files to
    /// customize agent system prompts.
    #[command(after_help = r#"Examples:
  deep-research init-prompts                       # ~/.config/deep-research/prompts
  deep-research init-prompts --dir ./prompts
  DEEP_RESEARCH_PROMPT_DIR=./prompts deep-research research "..."
"#)]
    InitPrompts {
        /// Target directory (defaults to ~/.config/deep-research/prompts).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Arguments for the `research` command.
///
/// Every option overrides the matching environment variable.
#[derive(clap::Args, Debug, Default)]
pub struct ResearchArgs {
    /// The research question.
    pub question: String,

    /// Round budget for the research loop.
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Search results requested per query.
    #[arg(long)]
    pub search_count: Option<usize>,

    /// Minimum fragment relevance (0.0-1.0).
    #[arg(long)]
    pub min_relevance: Option<f32>,

    /// Maximum concurrent page fetches.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Completion backend (ollama, openai).
    #[arg(long)]
    pub provider: Option<String>,

    /// Base URL of the completion backend.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Model for every role without a role-specific override.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Model for the planner.
    #[arg(long)]
    pub planner_model: Option<String>,

    /// Model for content extraction.
    #[arg(long)]
    pub reader_model: Option<String>,

    /// Model for the critic.
    #[arg(long)]
    pub critic_model: Option<String>,

    /// Model for the report writer.
    #[arg(long)]
    pub writer_model: Option<String>,

    /// `SearXNG` instance URL.
    #[arg(long)]
    pub searxng_url: Option<String>,

    /// Directory containing prompt template files.
    #[arg(long)]
    pub prompt_dir: Option<PathBuf>,

    /// Allow concurrent completion calls (for hosted backends).
    #[arg(long)]
    pub no_single_flight: bool,

    /// Write the markdown report to this file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stream progress events to stderr as JSON lines.
    #[arg(long)]
    pub progress: bool,
}
