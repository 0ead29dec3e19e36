//! Budget alignment between an organisation budget and a creator's rates.

use tandem_core::{Benchmark, PriceRange};

use super::FactorScore;

/// Score when the creator range lies wholly inside the budget.
pub const FULL_OVERLAP: f64 = 100.0;
/// Score at the point where partial overlap meets disjoint ranges.
pub const TOUCHING: f64 = 60.0;

/// Creator rate range: the explicit rate, else the benchmark rate band.
///
/// The second element is the support of the range: 1 for an explicit rate,
/// the benchmark confidence for a benchmark-derived band.
#[must_use]
pub fn creator_range(rate: Option<PriceRange>, benchmark: &Benchmark) -> Option<(PriceRange, f64)> {
    if let Some(explicit) = rate.and_then(PriceRange::normalised) {
        return Some((explicit, 1.0));
    }
    let band = benchmark.rate_band?;
    PriceRange::new(band.low, band.high)
        .normalised()
        .map(|range| (range, benchmark.confidence))
}

/// Alignment of the creator's rates with the organisation's budget.
///
/// # Examples
/// ```
/// use tandem_core::{Benchmark, PriceRange};
/// use tandem_scorer::factors::budget::score;
///
/// let budget = PriceRange::new(1_000.0, 5_000.0);
/// let result = score(Some(PriceRange::point(3_000.0)), &Benchmark::neutral(), Some(budget));
/// assert_eq!(result.value, 100.0);
/// ```
#[must_use]
pub fn score(
    rate: Option<PriceRange>,
    benchmark: &Benchmark,
    budget: Option<PriceRange>,
) -> FactorScore {
    let Some(budget) = budget.and_then(PriceRange::normalised) else {
        return FactorScore::uninformed();
    };
    let Some((creator, support)) = creator_range(rate, benchmark) else {
        return FactorScore::uninformed();
    };
    FactorScore::supported(alignment(&creator, &budget), support)
}

#[expect(
    clippy::float_arithmetic,
    reason = "alignment interpolates between overlap and gap distances"
)]
fn alignment(creator: &PriceRange, budget: &PriceRange) -> f64 {
    if budget.contains(creator) {
        return FULL_OVERLAP;
    }
    let overlap = budget.overlap(creator);
    let width = creator.width();
    if overlap > 0.0 && width > 0.0 {
        return TOUCHING + (FULL_OVERLAP - TOUCHING) * overlap / width;
    }
    let scale = creator.max.max(budget.max);
    if scale <= 0.0 {
        return 0.0;
    }
    (TOUCHING * (1.0 - budget.gap(creator) / scale)).max(0.0)
}

#[cfg(test)]
#[expect(
    clippy::float_arithmetic,
    reason = "assertions compare interpolated scores"
)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tandem_core::RateBand;

    fn budget() -> Option<PriceRange> {
        Some(PriceRange::new(1_000.0, 5_000.0))
    }

    #[rstest]
    #[case(PriceRange::point(3_000.0), 100.0)]
    #[case(PriceRange::new(1_000.0, 5_000.0), 100.0)]
    #[case(PriceRange::new(4_000.0, 6_000.0), 80.0)]
    #[case(PriceRange::new(5_000.0, 7_000.0), 60.0)]
    #[case(PriceRange::new(7_000.0, 9_000.0), 60.0 * (1.0 - 2_000.0 / 9_000.0))]
    #[case(PriceRange::point(100_000.0), 60.0 * (1.0 - 95_000.0 / 100_000.0))]
    fn scores_overlap_and_gap(#[case] rate: PriceRange, #[case] expected: f64) {
        let result = score(Some(rate), &Benchmark::neutral(), budget());
        assert!((result.value - expected).abs() < 1e-9, "got {}", result.value);
        assert_eq!(result.support, 1.0);
    }

    #[rstest]
    fn falls_back_to_benchmark_band() {
        let mut benchmark = Benchmark::neutral();
        benchmark.rate_band = Some(RateBand {
            low: 2_000.0,
            median: 2_500.0,
            high: 3_000.0,
        });
        benchmark.confidence = 0.4;
        let result = score(None, &benchmark, budget());
        assert_eq!(result, FactorScore::supported(100.0, 0.4));
    }

    #[rstest]
    fn missing_budget_or_rate_is_uninformed() {
        assert_eq!(
            score(Some(PriceRange::point(10.0)), &Benchmark::neutral(), None),
            FactorScore::uninformed()
        );
        assert_eq!(
            score(None, &Benchmark::neutral(), budget()),
            FactorScore::uninformed()
        );
    }
}
