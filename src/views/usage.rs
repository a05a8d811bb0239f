//! Usage percentile summaries

/// Average, max and p95 of a usage series
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageSummary {
    pub average: f64,
    pub max: f64,
    pub p95: f64,
    pub samples: usize,
}

/// Nearest-rank percentile: `ceil(n * p / 100) - 1` on the sorted input
///
/// Non-finite samples are ignored. An empty series yields 0.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let rank = (n as f64 * p / 100.0).ceil() as i64 - 1;
    let index = rank.clamp(0, n as i64 - 1) as usize;
    sorted[index]
}

pub fn summarize(values: &[f64]) -> UsageSummary {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return UsageSummary::default();
    }

    let sum: f64 = finite.iter().sum();
    UsageSummary {
        average: sum / finite.len() as f64,
        max: finite.iter().copied().fold(f64::MIN, f64::max),
        p95: percentile(&finite, 95.0),
        samples: finite.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_fixtures() {
        assert_eq!(percentile(&[10.0, 20.0, 30.0, 40.0, 50.0], 95.0), 50.0);
        assert_eq!(percentile(&[100.0], 95.0), 100.0);
        assert_eq!(percentile(&[], 95.0), 0.0);
    }

    #[test]
    fn test_percentile_uses_ceiling_rank() {
        let values: Vec<f64> = (1..=20).map(f64::from).collect();
        // ceil(20 * 0.95) - 1 = 18
        assert_eq!(percentile(&values, 95.0), 19.0);
        assert_eq!(percentile(&values, 50.0), 10.0);
        assert_eq!(percentile(&values, 0.0), 1.0);
    }

    #[test]
    fn test_percentile_sorts_input() {
        assert_eq!(percentile(&[50.0, 10.0, 40.0, 20.0, 30.0], 95.0), 50.0);
    }

    #[test]
    fn test_summarize() {
        let s = summarize(&[10.0, 20.0, f64::NAN, 30.0]);
        assert_eq!(s.samples, 3);
        assert_eq!(s.average, 20.0);
        assert_eq!(s.max, 30.0);
        assert_eq!(s.p95, 30.0);
        assert_eq!(summarize(&[]), UsageSummary::default());
    }
}
