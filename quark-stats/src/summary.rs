//! Summary Statistics
//!
//! Every statistic rejects an empty series with [`StatsError::EmptySeries`]
//! naming the statistic that was requested.

use crate::interval::confidence_interval;
use crate::percentiles::compute_percentile;
use crate::{StatsError, TimeUnit};
use serde::{Deserialize, Serialize};

/// Persisted summary of one task's timing samples
///
/// Field names are the keys of the JSON artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Arithmetic mean
    pub mean_time: f64,
    /// Linear-interpolated 50th percentile
    pub median_time: f64,
    /// Fastest sample
    pub min_time: f64,
    /// Slowest sample
    pub max_time: f64,
    /// Sample standard deviation (Bessel-corrected)
    pub std_dev: f64,
    /// Confidence interval around the mean
    pub confidence_interval: (f64, f64),
    /// Number of measured samples
    pub samples: usize,
}

fn non_empty(samples: &[f64], statistic: &'static str) -> Result<(), StatsError> {
    if samples.is_empty() {
        Err(StatsError::EmptySeries { statistic })
    } else {
        Ok(())
    }
}

/// Arithmetic mean, kept within `[min, max]` despite rounding
pub fn mean(samples: &[f64]) -> Result<f64, StatsError> {
    non_empty(samples, "mean")?;
    let (lo, hi) = bounds(samples);
    Ok((samples.iter().sum::<f64>() / samples.len() as f64).clamp(lo, hi))
}

fn bounds(samples: &[f64]) -> (f64, f64) {
    samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)))
}

/// Median (50th percentile, interpolated)
pub fn median(samples: &[f64]) -> Result<f64, StatsError> {
    non_empty(samples, "median")?;
    Ok(compute_percentile(samples, 50.0))
}

/// Smallest sample
pub fn min(samples: &[f64]) -> Result<f64, StatsError> {
    non_empty(samples, "min")?;
    Ok(samples.iter().copied().fold(f64::INFINITY, f64::min))
}

/// Largest sample
pub fn max(samples: &[f64]) -> Result<f64, StatsError> {
    non_empty(samples, "max")?;
    Ok(samples.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

/// Sample standard deviation; 0 for a single sample or a constant series
pub fn std_dev(samples: &[f64]) -> Result<f64, StatsError> {
    non_empty(samples, "std_dev")?;
    let (lo, hi) = bounds(samples);
    if samples.len() < 2 || lo == hi {
        return Ok(0.0);
    }
    let m = mean(samples)?;
    let variance =
        samples.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
    Ok(variance.sqrt())
}

/// Compute the full summary, scaled to `unit`
pub fn compute_summary(
    samples: &[f64],
    unit: TimeUnit,
    confidence: f64,
) -> Result<Summary, StatsError> {
    let (lo, hi) = confidence_interval(samples, confidence)?;
    Ok(Summary {
        mean_time: unit.scale(mean(samples)?),
        median_time: unit.scale(median(samples)?),
        min_time: unit.scale(min(samples)?),
        max_time: unit.scale(max(samples)?),
        std_dev: unit.scale(std_dev(samples)?),
        confidence_interval: (unit.scale(lo), unit.scale(hi)),
        samples: samples.len(),
    })
}
