//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

#![allow(clippy::format_push_string)]

use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::{
    Orchestrator, ProgressCallback, ProgressEvent, PromptSet, ResearchConfig, create_provider,
};
use crate::cli::output::{OutputFormat, format_outcome};
use crate::cli::parser::{Cli, Commands, ResearchArgs};
use crate::error::{CommandError, Result};
use crate::web::{HttpFetcher, SearxngSearcher};

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Research(args) => cmd_research(args, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Resolves the research configuration: CLI flags, then environment, then defaults.
fn build_config(args: &ResearchArgs) -> Result<ResearchConfig> {
    let mut builder = ResearchConfig::builder();
    if let Some(n) = args.max_iterations {
        builder = builder.max_iterations(n);
    }
    if let Some(n) = args.search_count {
        builder = builder.search_count(n);
    }
    if let Some(score) = args.min_relevance {
        builder = builder.min_relevance(score);
    }
    if let Some(n) = args.concurrency {
        builder = builder.max_fetch_concurrency(n);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider(provider);
    }
    if let Some(ref url) = args.base_url {
        builder = builder.base_url(url);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref model) = args.planner_model {
        builder = builder.planner_model(model);
    }
    if let Some(ref model) = args.reader_model {
        builder = builder.reader_model(model);
    }
    if let Some(ref model) = args.critic_model {
        builder = builder.critic_model(model);
    }
    if let Some(ref model) = args.writer_model {
        builder = builder.writer_model(model);
    }
    if let Some(ref url) = args.searxng_url {
        builder = builder.searxng_url(url);
    }
    if let Some(ref dir) = args.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    if args.no_single_flight {
        builder = builder.single_flight(false);
    }

    builder.from_env().build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Research configuration error: {e}")).into()
    })
}

/// Progress callback writing one JSON line per event to stderr.
fn stderr_progress() -> ProgressCallback {
    Arc::new(|event: &ProgressEvent| {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{line}");
        }
    })
}

fn cmd_research(args: &ResearchArgs, format: OutputFormat) -> Result<String> {
    let config = build_config(args)?;

    let provider = create_provider(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Provider creation failed: {e}"))
    })?;
    let searcher = SearxngSearcher::new(&config.searxng_url, config.web_timeout, config.max_retries)
        .map_err(|e| CommandError::ExecutionFailed(format!("Search client setup failed: {e}")))?;
    let fetcher = HttpFetcher::new(
        config.web_timeout,
        config.min_content_length,
        config.max_content_length,
    )
    .map_err(|e| CommandError::ExecutionFailed(format!("Fetch client setup failed: {e}")))?;

    let cancel = CancellationToken::new();
    let mut orchestrator =
        Orchestrator::new(provider, Arc::new(searcher), Arc::new(fetcher), config)
            .with_cancellation(cancel.clone());
    if args.progress {
        orchestrator = orchestrator.with_progress(stderr_progress());
    }

    // Create tokio runtime as sync/async bridge
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;

    let result = rt.block_on(async {
        let watcher = cancel.clone();
        let signal = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, writing report from gathered evidence");
                watcher.cancel();
            }
        });
        let result = orchestrator.research(&args.question).await;
        signal.abort();
        result
    });

    let outcome =
        result.map_err(|e| CommandError::ExecutionFailed(format!("Research failed: {e}")))?;

    if let Some(ref path) = args.output {
        write_report(path, &outcome.document.to_markdown())?;
        info!(path = %path.display(), "report written");
    }

    match format {
        OutputFormat::Text => Ok(format_outcome(&outcome)),
        OutputFormat::Json => serde_json::to_string_pretty(&outcome)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| {
                CommandError::OutputFormat(format!("JSON serialization failed: {e}")).into()
            }),
    }
}

fn write_report(path: &Path, markdown: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, markdown)?;
    Ok(())
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ))
            } else {
                let mut output = format!(
                    "Wrote {} prompt template(s) to: {}\n",
                    written.len(),
                    target_dir.display()
                );
                for path in &written {
                    output.push_str(&format!(
                        "  {}\n",
                        path.file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("unknown")
                    ));
                }
                output.push_str("\nEdit these files to customize agent system prompts.\n");
                Ok(output)
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}
