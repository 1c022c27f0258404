//! deep-research binary entry point.

use std::io::{self, Write};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use deep_research::cli::{Cli, execute};

fn init_logging(verbose: bool) {
    let default = if verbose {
        "deep_research=debug"
    } else {
        "deep_research=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = execute(&cli)?;
    io::stdout()
        .write_all(output.as_bytes())
        .context("failed to write output")?;
    Ok(())
}
