//! Normal-approximation confidence intervals.

use crate::StatsError;

/// Two-sided critical value of the standard normal for `confidence`
///
/// The conventional 1.96 is returned verbatim at 95% so reported intervals
/// match hand-computed ones; other levels use the inverse normal CDF.
pub fn z_critical(confidence: f64) -> Result<f64, StatsError> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(StatsError::InvalidConfidence(confidence));
    }
    if (confidence - 0.95).abs() < 1e-12 {
        return Ok(1.96);
    }
    Ok(normal_quantile(0.5 + confidence / 2.0))
}

/// `mean ± z·sd/√n` over `samples`
///
/// Fewer than two samples yield the degenerate interval `(mean, mean)`.
pub fn confidence_interval(samples: &[f64], confidence: f64) -> Result<(f64, f64), StatsError> {
    let z = z_critical(confidence)?;
    let mean = crate::summary::mean(samples)?;
    if samples.len() < 2 {
        return Ok((mean, mean));
    }
    let sd = crate::summary::std_dev(samples)?;
    let half = z * sd / (samples.len() as f64).sqrt();
    Ok((mean - half, mean + half))
}

/// Inverse of the standard normal CDF
///
/// Rational approximation (Abramowitz and Stegun 26.2.23), absolute error
/// below 4.5e-4.
pub fn normal_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let p = p.clamp(1e-10, 1.0 - 1e-10);
    let (sign, tail) = if p < 0.5 { (-1.0, p) } else { (1.0, 1.0 - p) };
    let t = (-2.0 * tail.ln()).sqrt();

    const C: [f64; 3] = [2.515517, 0.802853, 0.010328];
    const D: [f64; 3] = [1.432788, 0.189269, 0.001308];

    let num = C[0] + C[1] * t + C[2] * t * t;
    let den = 1.0 + D[0] * t + D[1] * t * t + D[2] * t * t * t;
    sign * (t - num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_at_95_is_exact() {
        assert_eq!(z_critical(0.95).unwrap(), 1.96);
    }

    #[test]
    fn test_z_other_levels() {
        assert!((z_critical(0.99).unwrap() - 2.576).abs() < 1e-2);
        assert!((z_critical(0.90).unwrap() - 1.645).abs() < 1e-2);
    }

    #[test]
    fn test_invalid_confidence() {
        assert_eq!(z_critical(0.0), Err(StatsError::InvalidConfidence(0.0)));
        assert_eq!(z_critical(1.0), Err(StatsError::InvalidConfidence(1.0)));
        assert!(z_critical(f64::NAN).is_err());
    }

    #[test]
    fn test_interval_known_values() {
        // mean 2.5, sd = sqrt(5/3)
        let samples = [1.0, 2.0, 3.0, 4.0];
        let (lo, hi) = confidence_interval(&samples, 0.95).unwrap();
        let half = 1.96 * (5.0f64 / 3.0).sqrt() / 2.0;
        assert!((lo - (2.5 - half)).abs() < 1e-12);
        assert!((hi - (2.5 + half)).abs() < 1e-12);
    }

    #[test]
    fn test_interval_single_sample_is_degenerate() {
        assert_eq!(confidence_interval(&[0.3], 0.95).unwrap(), (0.3, 0.3));
    }

    #[test]
    fn test_interval_empty() {
        assert!(matches!(
            confidence_interval(&[], 0.95),
            Err(StatsError::EmptySeries { .. })
        ));
    }

    #[test]
    fn test_quantile_symmetry() {
        let lo = normal_quantile(0.025);
        let hi = normal_quantile(0.975);
        assert!((lo + hi).abs() < 1e-9);
        assert!((hi - 1.96).abs() < 1e-2);
    }
}
