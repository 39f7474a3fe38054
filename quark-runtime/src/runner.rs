//! Runner
//!
//! Owns the four components built for one task, drives the timer over the
//! executor's single-observation entry point, and persists the result.

use crate::builders::{TimerSettings, build_data_provider, build_executor, build_timer, build_workload};
use crate::component::{DataProvider, ExecutorBackend, Workload};
use quark_config::BenchmarkConfig;
use quark_core::{Result, Timer};
use quark_report::ResultRecord;
use quark_stats::{DEFAULT_CONFIDENCE_LEVEL, Summary, TimeUnit};
use std::path::PathBuf;
use tracing::{debug, info};

/// Default directory for result artifacts
pub const DEFAULT_RESULTS_DIR: &str = "build/benchmarks";

/// Knobs that are not part of the task itself
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerOptions {
    /// Directory receiving `<label>.json`
    pub results_dir: PathBuf,
    /// Unit of the persisted statistics
    pub unit: TimeUnit,
    /// Confidence level of the interval
    pub confidence: f64,
    /// Measured repetitions; overrides `experiment.repeat`
    pub repeat: Option<usize>,
    /// Warmup repetitions; overrides `experiment.warmup`
    pub warmup: Option<usize>,
    /// Counts used when neither the options nor the task set them
    pub fallback: TimerSettings,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            unit: TimeUnit::Seconds,
            confidence: DEFAULT_CONFIDENCE_LEVEL,
            repeat: None,
            warmup: None,
            fallback: TimerSettings::default(),
        }
    }
}

impl RunnerOptions {
    /// Repetition counts for `config`: options, then task, then defaults
    pub fn timer_settings(&self, config: &BenchmarkConfig) -> TimerSettings {
        TimerSettings {
            repeat: self
                .repeat
                .or(config.experiment.repeat)
                .unwrap_or(self.fallback.repeat),
            warmup: self
                .warmup
                .or(config.experiment.warmup)
                .unwrap_or(self.fallback.warmup),
        }
    }
}

/// Runs one benchmark task
pub struct Runner {
    config: BenchmarkConfig,
    options: RunnerOptions,
    workload: Box<dyn Workload>,
    executor: Box<dyn ExecutorBackend>,
    data: Box<dyn DataProvider>,
    timer: Timer,
    record: Option<ResultRecord>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("label", &self.config.label)
            .field("workload", &self.workload.describe())
            .field("executor", &self.executor.describe())
            .field("data", &self.data.describe())
            .field("timer", &self.timer)
            .finish()
    }
}

impl Runner {
    /// Build and validate every component with default options
    pub fn new(config: BenchmarkConfig) -> Result<Self> {
        Self::with_options(config, RunnerOptions::default())
    }

    /// Build and validate every component
    ///
    /// Any component failing its own `validate` is a construction error.
    pub fn with_options(config: BenchmarkConfig, options: RunnerOptions) -> Result<Self> {
        quark_stats::z_critical(options.confidence)?;

        let workload = build_workload(&config)?;
        let executor = build_executor(&config)?;
        let data = build_data_provider(&config)?;
        let timer = build_timer(&config, options.timer_settings(&config))?;

        workload.validate()?;
        executor.validate()?;
        data.validate()?;
        timer.validate()?;

        debug!(label = %config.label, "runner ready");
        Ok(Self {
            config,
            options,
            workload,
            executor,
            data,
            timer,
            record: None,
        })
    }

    /// Task being run
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Options in effect
    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// The timer, including the raw samples of the last run
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Time the task, persist `<results_dir>/<label>.json`, return the record
    pub fn run(&mut self) -> Result<&ResultRecord> {
        let Self {
            config,
            workload,
            executor,
            data,
            timer,
            ..
        } = &mut *self;
        info!(
            label = %config.label,
            workload = %workload.describe(),
            repeat = timer.repeat_samples(),
            warmup = timer.warmup_samples(),
            "running task"
        );
        timer.run(|| executor.execute(workload.as_mut(), data.as_mut()))?;

        let summary = self
            .timer
            .summary(self.options.unit, self.options.confidence)?;
        let record = ResultRecord::new(self.config.clone(), summary);
        record.persist(&self.options.results_dir)?;
        Ok(self.record.insert(record))
    }

    /// Summary of the last successful run; `None` before the first
    pub fn results(&self) -> Option<&Summary> {
        self.record.as_ref().map(|r| &r.summary)
    }

    /// Full record of the last successful run
    pub fn record(&self) -> Option<&ResultRecord> {
        self.record.as_ref()
    }
}
