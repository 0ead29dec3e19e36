//! Engagement quality relative to the segment benchmark.

use tandem_core::{Benchmark, NEUTRAL_SCORE};

use super::FactorScore;

/// Percentile of `rate` within the benchmark, shrunk toward neutral.
///
/// The shrinkage factor is the benchmark confidence: a neutral benchmark
/// always yields the neutral score, a saturated one yields the raw
/// percentile.
///
/// # Examples
/// ```
/// use tandem_core::Benchmark;
/// use tandem_scorer::factors::engagement::score;
///
/// let mut benchmark = Benchmark::neutral();
/// assert_eq!(score(Some(8.0), &benchmark).value, 50.0);
/// benchmark.confidence = 1.0;
/// assert_eq!(score(Some(8.0), &benchmark).value, 90.0);
/// ```
#[must_use]
pub fn score(rate: Option<f64>, benchmark: &Benchmark) -> FactorScore {
    let Some(rate) = rate.filter(|r| r.is_finite() && *r >= 0.0) else {
        return FactorScore::uninformed();
    };
    let confidence = benchmark.confidence.clamp(0.0, 1.0);
    let raw = benchmark.engagement.percentile_of(rate);
    FactorScore::supported(shrink(raw, confidence), confidence)
}

#[expect(
    clippy::float_arithmetic,
    reason = "shrinkage interpolates toward the neutral score"
)]
fn shrink(raw: f64, confidence: f64) -> f64 {
    NEUTRAL_SCORE + confidence * (raw - NEUTRAL_SCORE)
}

#[cfg(test)]
#[expect(clippy::float_arithmetic, reason = "assertions compare shrunk percentiles")]
mod tests {
    use super::*;
    use rstest::rstest;

    fn benchmark(confidence: f64) -> Benchmark {
        Benchmark {
            confidence,
            ..Benchmark::neutral()
        }
    }

    #[rstest]
    #[case(0.0, 50.0)]
    #[case(0.5, 70.0)]
    #[case(1.0, 90.0)]
    fn shrinks_toward_neutral(#[case] confidence: f64, #[case] expected: f64) {
        let result = score(Some(8.0), &benchmark(confidence));
        assert!((result.value - expected).abs() < 1e-9);
        assert_eq!(result.support, confidence);
    }

    #[rstest]
    fn low_engagement_scores_below_neutral() {
        let result = score(Some(0.5), &benchmark(1.0));
        assert!((result.value - 5.0).abs() < 1e-9);
    }

    #[rstest]
    fn missing_rate_is_uninformed() {
        assert_eq!(score(None, &benchmark(1.0)), FactorScore::uninformed());
        assert_eq!(score(Some(f64::NAN), &benchmark(1.0)), FactorScore::uninformed());
    }
}
