//! Component Builders
//!
//! One factory per role, each keyed off a categorical field of the task:
//!
//! | Role          | Field                               |
//! |---------------|-------------------------------------|
//! | workload      | `workload.framework`                |
//! | executor      | `experiment.executor.framework`     |
//! | data provider | `experiment.executor.framework`     |
//! | timer         | `experiment.timer`                  |
//!
//! `native` resolves to the built-in backend; any other tag is looked up
//! among submitted framework plugins. `UNKNOWN` and recognised tags without
//! an implementation fail with [`quark_core::UnsupportedComponentError`].
//! Builders never modify the task.

use crate::component::{DataProvider, ExecutorBackend, Workload};
use crate::native;
use crate::plugin::find_plugin;
use quark_config::BenchmarkConfig;
use quark_core::{
    Clock, DEFAULT_REPEAT_SAMPLES, DEFAULT_WARMUP_SAMPLES, EventClock, HostTimeline, QuarkError,
    Result, Timer, WallClock, tags,
};

/// Repetition counts handed to [`build_timer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    /// Measured repetitions
    pub repeat: usize,
    /// Discarded warmup repetitions
    pub warmup: usize,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            repeat: DEFAULT_REPEAT_SAMPLES,
            warmup: DEFAULT_WARMUP_SAMPLES,
        }
    }
}

/// Build the workload named by `workload.framework`
pub fn build_workload(config: &BenchmarkConfig) -> Result<Box<dyn Workload>> {
    let framework = &config.workload.framework;
    let workload = if framework.is(tags::NATIVE) {
        native::workload(config)?
    } else {
        let factory = find_plugin(framework.tag())
            .and_then(|p| p.workload)
            .ok_or_else(|| QuarkError::unsupported("workload.framework", framework))?;
        factory(config)?
    };
    tracing::debug!(workload = %workload.describe(), "built workload");
    Ok(workload)
}

/// Build the executor named by `experiment.executor.framework`
pub fn build_executor(config: &BenchmarkConfig) -> Result<Box<dyn ExecutorBackend>> {
    let framework = &config.experiment.executor.framework;
    let executor = if framework.is(tags::NATIVE) {
        native::executor(config)?
    } else {
        let factory = find_plugin(framework.tag())
            .and_then(|p| p.executor)
            .ok_or_else(|| QuarkError::unsupported("experiment.executor.framework", framework))?;
        factory(config)?
    };
    tracing::debug!(executor = %executor.describe(), "built executor");
    Ok(executor)
}

/// Build the data provider of the executor's framework for `dataset.source`
pub fn build_data_provider(config: &BenchmarkConfig) -> Result<Box<dyn DataProvider>> {
    let framework = &config.experiment.executor.framework;
    let provider = if framework.is(tags::NATIVE) {
        native::data_provider(config)?
    } else {
        let factory = find_plugin(framework.tag())
            .and_then(|p| p.data_provider)
            .ok_or_else(|| QuarkError::unsupported("experiment.executor.framework", framework))?;
        factory(config)?
    };
    tracing::debug!(data = %provider.describe(), "built data provider");
    Ok(provider)
}

/// Build the timer named by `experiment.timer`
pub fn build_timer(config: &BenchmarkConfig, settings: TimerSettings) -> Result<Timer> {
    let kind = &config.experiment.timer;
    let clock: Box<dyn Clock> = match kind.tag() {
        tags::GENERIC => Box::new(WallClock::default()),
        tags::EVENT => Box::new(EventClock::new(HostTimeline::default())),
        tag => {
            let make = find_plugin(tag)
                .and_then(|p| p.clock)
                .ok_or_else(|| QuarkError::unsupported("experiment.timer", kind))?;
            make()
        }
    };
    tracing::debug!(
        timer = %kind,
        repeat = settings.repeat,
        warmup = settings.warmup,
        "built timer"
    );
    Ok(Timer::new(kind.clone(), clock, settings.repeat, settings.warmup))
}
