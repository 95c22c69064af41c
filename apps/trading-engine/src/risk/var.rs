//! Historical-percentile Value-at-Risk math.
//!
//! The estimate is deliberately simple: tail percentile of unconditional
//! daily log returns, scaled by leverage. It is a coarse loss bound for
//! the operator, not a full P&L-based VaR.

/// Log returns over consecutive closes.
///
/// Pairs containing a non-positive close are skipped.
#[must_use]
pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|pair| pair[0] > 0.0 && pair[1] > 0.0)
        .map(|pair| (pair[1] / pair[0]).ln())
        .collect()
}

/// Percentile of `values` with linear interpolation between ranks.
///
/// `p` is clamped to [0, 100]. Non-finite values are ignored; an empty
/// input yields 0.
#[must_use]
pub fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_returns_skip_non_positive_closes() {
        let returns = log_returns(&[100.0, 110.0, 0.0, 121.0]);
        assert_eq!(returns.len(), 1);
        assert!((returns[0] - (110.0f64 / 100.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_interpolates_between_ranks() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((percentile(&values, 50.0) - 3.0).abs() < 1e-12);
        // Rank 0.25 * 4 = 1.0 lands exactly on the second element.
        assert!((percentile(&values, 25.0) - 2.0).abs() < 1e-12);
        // Rank 0.10 * 4 = 0.4 interpolates between 1.0 and 2.0.
        assert!((percentile(&values, 10.0) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_tail_of_larger_sample() {
        let values: Vec<f64> = (0..100).map(f64::from).collect();
        assert!((percentile(&values, 1.0) - 0.99).abs() < 1e-12);
        assert!((percentile(&values, 99.0) - 98.01).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_degenerate_inputs() {
        assert!((percentile(&[], 50.0) - 0.0).abs() < f64::EPSILON);
        assert!((percentile(&[7.5], 99.0) - 7.5).abs() < f64::EPSILON);
        assert!((percentile(&[1.0, f64::NAN, 3.0], 100.0) - 3.0).abs() < f64::EPSILON);
    }
}
