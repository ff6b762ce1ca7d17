//! Procscope CLI - stored-procedure dependency auditor

use procscope_cli::cli::{Args, OutputFormat};
use procscope_cli::input;
use procscope_cli::locator::FileSourceLocator;
use procscope_cli::output;

use anyhow::{Context, Result};
use clap::Parser;
use procscope_core::{resolve, ResolveOutcome};
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

/// Unresolved names or unanalyzable batches were recorded.
const EXIT_FAILURE: u8 = 1;
/// Configuration error (missing root, missing list, no names requested).
const EXIT_CONFIG_ERROR: u8 = 66;

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(has_failures) => {
            if has_failures {
                ExitCode::from(EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("procscope: error: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn run(args: Args) -> Result<bool> {
    // Fatal preconditions are checked once, before any processing.
    let mut requested = Vec::new();
    if let Some(list) = &args.list {
        requested.extend(input::read_list(list)?);
    }
    requested.extend(args.procedures.iter().cloned());
    if requested.is_empty() {
        anyhow::bail!("no procedures requested (pass names or --list)");
    }

    let locator = FileSourceLocator::new(&args.root).context("Failed to index source root")?;
    if !args.quiet {
        eprintln!(
            "procscope: indexed {} procedures across {} files",
            locator.procedure_count(),
            locator.file_count()
        );
    }

    let outcome = resolve(&locator, &requested);

    let output_str = match args.format {
        OutputFormat::Table => output::format_table(&outcome.report, !args.quiet),
        OutputFormat::Json => output::format_json(&outcome.report, args.compact)?,
        OutputFormat::Csv => output::format_csv(&outcome.report),
    };
    write_output(&args.output, &output_str)?;

    if !args.quiet {
        print_failures_to_stderr(&outcome);
    }

    Ok(outcome.report.has_failures())
}

fn write_output(path: &Option<std::path::PathBuf>, content: &str) -> Result<()> {
    if let Some(path) = path {
        fs::write(path, content)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
    } else {
        io::stdout()
            .write_all(content.as_bytes())
            .context("Failed to write to stdout")?;
        if !content.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

fn print_failures_to_stderr(outcome: &ResolveOutcome) {
    for failure in &outcome.failures {
        let origin = failure
            .origin
            .as_deref()
            .map(|o| format!(" ({o})"))
            .unwrap_or_default();
        eprintln!(
            "procscope: warning: {}{origin}: {}",
            failure.procedure, failure.error
        );
    }
}
