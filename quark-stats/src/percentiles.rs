//! Percentile Computation
//!
//! Linear interpolation between nearest ranks over the raw samples.

/// Compute a single percentile from samples
///
/// Uses linear interpolation between nearest ranks. Returns 0.0 for an
/// empty slice; callers that must reject empty input check first.
///
/// # Examples
///
/// ```
/// # use quark_stats::compute_percentile;
/// let samples = vec![4.0, 1.0, 3.0, 2.0];
/// assert!((compute_percentile(&samples, 50.0) - 2.5).abs() < 1e-12);
/// ```
pub fn compute_percentile(samples: &[f64], percentile: f64) -> f64 {
    match samples {
        [] => 0.0,
        [only] => *only,
        _ => {
            let mut ordered = samples.to_vec();
            ordered.sort_unstable_by(f64::total_cmp);

            let last = ordered.len() - 1;
            let rank = (percentile / 100.0).clamp(0.0, 1.0) * last as f64;
            let below = rank.floor() as usize;
            let above = (below + 1).min(last);
            ordered[below] + rank.fract() * (ordered[above] - ordered[below])
        }
    }
}
