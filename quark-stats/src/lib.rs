#![warn(missing_docs)]
//! Quark Statistical Engine
//!
//! Reduces a series of timing samples (seconds) to the summary that every
//! benchmark task persists:
//! - Order statistics (min, max, interpolated median)
//! - Sample standard deviation with Bessel's correction
//! - Normal-approximation confidence intervals around the mean
//! - Unit conversion between seconds, milliseconds and microseconds

mod interval;
mod percentiles;
mod summary;
mod unit;

pub use interval::{confidence_interval, normal_quantile, z_critical};
pub use percentiles::compute_percentile;
pub use summary::{Summary, compute_summary, max, mean, median, min, std_dev};
pub use unit::{ParseUnitError, TimeUnit};

/// Default confidence level (95%)
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Errors raised while reducing a sample series
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatsError {
    /// A statistic was requested before any sample was recorded
    #[error("cannot compute {statistic}: the sample series is empty")]
    EmptySeries {
        /// Name of the requested statistic
        statistic: &'static str,
    },
    /// Confidence level outside the open interval (0, 1)
    #[error("confidence level must be in (0, 1), got {0}")]
    InvalidConfidence(f64),
}
