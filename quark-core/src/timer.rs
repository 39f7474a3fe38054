//! Timer - The Measurement State Machine
//!
//! `Idle → Warming → Measuring → Idle`. Warmup repetitions are discarded;
//! each measured repetition contributes one sample in seconds. A failure in
//! either phase aborts the run and leaves the sample series empty.

use crate::categorical::CategoricalValue;
use crate::error::QuarkError;
use crate::measure::Clock;
use quark_stats::{StatsError, Summary, TimeUnit};
use std::hint::black_box;
use tracing::{debug, trace, warn};

/// Phase of the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not running; samples (if any) are from the last successful run
    Idle,
    /// Running discarded warmup repetitions
    Warming,
    /// Running measured repetitions
    Measuring,
}

/// Repeats an operation and reduces its durations to statistics
pub struct Timer {
    kind: CategoricalValue,
    repeat_samples: usize,
    warmup_samples: usize,
    clock: Box<dyn Clock>,
    samples: Vec<f64>,
    state: TimerState,
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("kind", &self.kind)
            .field("repeat_samples", &self.repeat_samples)
            .field("warmup_samples", &self.warmup_samples)
            .field("samples", &self.samples.len())
            .field("state", &self.state)
            .finish()
    }
}

impl Timer {
    /// Create an idle timer with an empty series
    pub fn new(
        kind: CategoricalValue,
        clock: Box<dyn Clock>,
        repeat_samples: usize,
        warmup_samples: usize,
    ) -> Self {
        Self {
            kind,
            repeat_samples,
            warmup_samples,
            clock,
            samples: Vec::new(),
            state: TimerState::Idle,
        }
    }

    /// Timer kind this instance was built for
    pub fn kind(&self) -> &CategoricalValue {
        &self.kind
    }

    /// Number of measured repetitions per run
    pub fn repeat_samples(&self) -> usize {
        self.repeat_samples
    }

    /// Number of discarded warmup repetitions per run
    pub fn warmup_samples(&self) -> usize {
        self.warmup_samples
    }

    /// Current phase
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Recorded durations in seconds
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Total measured time in seconds
    pub fn elapsed_time(&self) -> f64 {
        self.samples.iter().sum()
    }

    /// Consistency check run by the owning runner
    pub fn validate(&self) -> Result<(), QuarkError> {
        if self.repeat_samples == 0 {
            return Err(QuarkError::invalid(
                "timer",
                "repeat_samples must be at least 1",
            ));
        }
        if self.kind.is_unknown() {
            return Err(QuarkError::unsupported("experiment.timer", &self.kind));
        }
        Ok(())
    }

    /// Warm up, then measure `operation` `repeat_samples` times
    ///
    /// Results of `operation` are discarded. The series is cleared before
    /// the first warmup call and again if any call fails.
    pub fn run<T, F>(&mut self, mut operation: F) -> Result<(), QuarkError>
    where
        F: FnMut() -> Result<T, QuarkError>,
    {
        self.samples.clear();
        let outcome = self.run_phases(&mut operation);
        self.state = TimerState::Idle;
        match &outcome {
            Ok(()) => debug!(
                timer = %self.kind,
                samples = self.samples.len(),
                total_secs = self.elapsed_time(),
                "timed run complete"
            ),
            Err(e) => {
                warn!(timer = %self.kind, error = %e, "timed run aborted, discarding samples");
                self.samples.clear();
            }
        }
        outcome
    }

    fn run_phases<T, F>(&mut self, operation: &mut F) -> Result<(), QuarkError>
    where
        F: FnMut() -> Result<T, QuarkError>,
    {
        self.state = TimerState::Warming;
        for i in 0..self.warmup_samples {
            trace!(iteration = i, "warmup");
            black_box(operation()?);
        }

        self.state = TimerState::Measuring;
        for _ in 0..self.repeat_samples {
            self.clock.start()?;
            let value = operation()?;
            let elapsed = self.clock.stop()?;
            black_box(value);
            trace!(secs = elapsed, "sample");
            self.samples.push(elapsed);
        }
        Ok(())
    }

    /// Mean duration in `unit`
    pub fn mean_time(&self, unit: TimeUnit) -> Result<f64, StatsError> {
        quark_stats::mean(&self.samples).map(|v| unit.scale(v))
    }

    /// Median duration in `unit`
    pub fn median_time(&self, unit: TimeUnit) -> Result<f64, StatsError> {
        quark_stats::median(&self.samples).map(|v| unit.scale(v))
    }

    /// Fastest duration in `unit`
    pub fn min_time(&self, unit: TimeUnit) -> Result<f64, StatsError> {
        quark_stats::min(&self.samples).map(|v| unit.scale(v))
    }

    /// Slowest duration in `unit`
    pub fn max_time(&self, unit: TimeUnit) -> Result<f64, StatsError> {
        quark_stats::max(&self.samples).map(|v| unit.scale(v))
    }

    /// Sample standard deviation in `unit`
    pub fn std_dev(&self, unit: TimeUnit) -> Result<f64, StatsError> {
        quark_stats::std_dev(&self.samples).map(|v| unit.scale(v))
    }

    /// Confidence interval around the mean, in `unit`
    pub fn confidence_interval(
        &self,
        confidence: f64,
        unit: TimeUnit,
    ) -> Result<(f64, f64), StatsError> {
        let (lo, hi) = quark_stats::confidence_interval(&self.samples, confidence)?;
        Ok((unit.scale(lo), unit.scale(hi)))
    }

    /// All statistics at once
    pub fn summary(&self, unit: TimeUnit, confidence: f64) -> Result<Summary, StatsError> {
        quark_stats::compute_summary(&self.samples, unit, confidence)
    }
}
