//! Audience size against a requested band, on a log scale.

use tandem_core::AudienceBand;

use super::FactorScore;

/// Proximity of `size` to `band`.
///
/// Sizes inside the band score 100. Outside it the score falls linearly
/// with the log10 distance to the nearest band edge, reaching zero at
/// `span_decades`, so 50k against a 10k ceiling costs far less than the raw
/// difference suggests.
///
/// # Examples
/// ```
/// use tandem_core::AudienceBand;
/// use tandem_scorer::factors::audience::score;
///
/// let band = AudienceBand::new(10_000, 100_000);
/// assert_eq!(score(Some(50_000), Some(band), 2.0).value, 100.0);
/// assert_eq!(score(Some(1_000_000), Some(band), 2.0).value, 50.0);
/// ```
#[must_use]
pub fn score(size: Option<u64>, band: Option<AudienceBand>, span_decades: f64) -> FactorScore {
    let (Some(size), Some(band)) = (size, band) else {
        return FactorScore::uninformed();
    };
    if band.contains(size) {
        return FactorScore::informed(100.0);
    }
    let edge = if size < band.min { band.min } else { band.max };
    FactorScore::informed(decay(log_distance(size, edge), span_decades))
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "audience sizes are compared in log space"
)]
fn log_distance(a: u64, b: u64) -> f64 {
    let la = (a.max(1) as f64).log10();
    let lb = (b.max(1) as f64).log10();
    (la - lb).abs()
}

#[expect(
    clippy::float_arithmetic,
    reason = "score decays linearly with log distance"
)]
fn decay(distance: f64, span_decades: f64) -> f64 {
    if span_decades <= 0.0 {
        return 0.0;
    }
    (100.0 * (1.0 - distance / span_decades)).max(0.0)
}

#[cfg(test)]
#[expect(clippy::float_arithmetic, reason = "assertions compare decayed scores")]
mod tests {
    use super::*;
    use rstest::rstest;

    fn band() -> Option<AudienceBand> {
        Some(AudienceBand::new(10_000, 100_000))
    }

    #[rstest]
    #[case(10_000, 100.0)]
    #[case(100_000, 100.0)]
    #[case(1_000, 50.0)]
    #[case(10, 0.0)]
    #[case(0, 0.0)]
    fn decays_with_log_distance(#[case] size: u64, #[case] expected: f64) {
        let result = score(Some(size), band(), 2.0);
        assert!((result.value - expected).abs() < 1e-9, "got {}", result.value);
    }

    #[rstest]
    fn small_relative_gaps_are_penalised_lightly() {
        let near = score(Some(150_000), band(), 2.0).value;
        assert!(near > 90.0, "got {near}");
    }

    #[rstest]
    fn missing_inputs_are_uninformed() {
        assert_eq!(score(None, band(), 2.0), FactorScore::uninformed());
        assert_eq!(score(Some(5), None, 2.0), FactorScore::uninformed());
    }
}
