#![warn(missing_docs)]
//! Quark CLI Library
//!
//! Command-line entry point for running benchmark task files. A task path may
//! be a single file or a directory searched recursively.
//!
//! # Example
//!
//! ```ignore
//! fn main() -> anyhow::Result<()> {
//!     quark_cli::run()
//! }
//! ```

mod config;
mod logging;
mod output;

pub use config::*;
pub use logging::LogContext;
pub use output::{format_human_output, format_plan};

use anyhow::Context;
use clap::Parser;
use quark_runtime::{Collector, RunnerOptions, TimerSettings};
use quark_stats::TimeUnit;
use regex::Regex;
use std::path::PathBuf;

/// Quark CLI arguments
#[derive(Parser, Debug)]
#[command(name = "quark")]
#[command(author, version, about = "Quark - benchmark orchestration for ML workloads")]
pub struct Cli {
    /// Task file, or directory of task files
    #[arg(default_value = "experiments")]
    pub task: PathBuf,

    /// Only run tasks whose label matches this regex
    #[arg(long)]
    pub label: Option<String>,

    /// Directory receiving `<label>.json` artifacts
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Measured repetitions, overriding every task
    #[arg(long)]
    pub repeat: Option<usize>,

    /// Warmup repetitions, overriding every task
    #[arg(long)]
    pub warmup: Option<usize>,

    /// Unit of reported statistics: sec, ms or us
    #[arg(long)]
    pub unit: Option<TimeUnit>,

    /// Confidence level of the reported interval
    #[arg(long)]
    pub confidence: Option<f64>,

    /// Dry run - list planned tasks without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Trace-level logging
    #[arg(long)]
    pub trace: bool,

    /// Debug-level logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Logging context requested by the flags
    pub fn log_context(&self) -> LogContext {
        LogContext {
            trace: self.trace,
            debug: self.debug,
        }
    }

    /// Runner options: flags first, then `settings`
    pub fn runner_options(&self, settings: &QuarkSettings) -> RunnerOptions {
        RunnerOptions {
            results_dir: self
                .results_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(&settings.output.directory)),
            unit: self.unit.unwrap_or(settings.output.unit),
            confidence: self.confidence.unwrap_or(settings.runner.confidence_level),
            repeat: self.repeat,
            warmup: self.warmup,
            fallback: TimerSettings {
                repeat: settings.runner.repeat_samples,
                warmup: settings.runner.warmup_samples,
            },
        }
    }
}

/// Run the Quark CLI with the process arguments
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the Quark CLI with pre-parsed arguments
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    cli.log_context().install();

    // quark.toml supplies defaults; flags override
    let settings = QuarkSettings::discover().unwrap_or_default();
    let options = cli.runner_options(&settings);

    let added = quark_runtime::register_plugins().context("registering plugins")?;
    tracing::debug!(count = added.len(), "plugin categories registered");

    let mut collector = Collector::new(options.clone()).with_progress(!cli.dry_run);
    if let Some(pattern) = &cli.label {
        let filter = Regex::new(pattern).with_context(|| format!("invalid --label regex {pattern:?}"))?;
        collector = collector.with_filter(filter);
    }

    let prepared = collector
        .prepare(&cli.task)
        .with_context(|| format!("reading tasks from {}", cli.task.display()))?;

    if cli.dry_run {
        print!("{}", format_plan(&prepared.plan));
        for failure in &prepared.failures {
            if let Err(e) = &failure.result {
                println!("  ✗ {}: {e}", failure.path.display());
            }
        }
        return Ok(());
    }

    let outcomes = collector.run(prepared);
    print!(
        "{}",
        format_human_output(&outcomes, options.unit, &options.results_dir)
    );

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} task(s) failed", outcomes.len());
    }
    Ok(())
}
