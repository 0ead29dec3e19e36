//! History-derived factors: `historicalSuccess` and `brandFit`.
//!
//! Both are recency-weighted means over the segment's ledger entries. The
//! newest entry has weight 1 and each older entry is multiplied by the
//! configured decay. Below the minimum outcome count both factors stay
//! neutral with zero support.

use crate::ScoringConfig;
use crate::ledger::LedgerEntry;

use super::FactorScore;

/// Recency-weighted satisfaction mapped onto `0..=100`.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "ratings map linearly onto the score range")]
pub fn historical_success(entries: &[LedgerEntry], config: &ScoringConfig) -> FactorScore {
    decayed(entries, config, |entry| {
        (f64::from(entry.rating.clamp(1, 5)) - 1.0) / 4.0 * 100.0
    })
}

/// Recency-weighted repeat-collaboration signal mapped onto `0..=100`.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "signals scale onto the score range")]
pub fn brand_fit(entries: &[LedgerEntry], config: &ScoringConfig) -> FactorScore {
    decayed(entries, config, |entry| entry.brand_signal.clamp(0.0, 1.0) * 100.0)
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "decayed means weight each entry by a geometric series"
)]
fn decayed<F>(entries: &[LedgerEntry], config: &ScoringConfig, value: F) -> FactorScore
where
    F: Fn(&LedgerEntry) -> f64,
{
    if entries.is_empty() || entries.len() < config.history_min_outcomes {
        return FactorScore::uninformed();
    }
    let mut weight = 1.0;
    let mut weighted = 0.0;
    let mut total = 0.0;
    for entry in entries {
        weighted += weight * value(entry);
        total += weight;
        weight *= config.recency_decay;
    }
    if total <= 0.0 {
        return FactorScore::uninformed();
    }
    let full = f64::from(config.min_sample_for_full_confidence.max(1));
    let support = (entries.len() as f64 / full).min(1.0);
    FactorScore::supported(weighted / total, support)
}

#[cfg(test)]
#[expect(
    clippy::float_arithmetic,
    reason = "expected values are derived from the decay series"
)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};

    #[fixture]
    fn config() -> ScoringConfig {
        ScoringConfig::default()
    }

    fn entries(ratings_newest_first: &[u8]) -> Vec<LedgerEntry> {
        let at = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp");
        ratings_newest_first
            .iter()
            .zip(0_u64..)
            .map(|(rating, sequence)| LedgerEntry {
                recorded_at: at,
                sequence,
                rating: *rating,
                brand_signal: if *rating >= 4 { 1.0 } else { 0.0 },
            })
            .collect()
    }

    #[rstest]
    fn below_minimum_count_is_neutral(config: ScoringConfig) {
        assert_eq!(
            historical_success(&entries(&[5, 5]), &config),
            FactorScore::uninformed()
        );
        assert_eq!(brand_fit(&[], &config), FactorScore::uninformed());
    }

    #[rstest]
    fn recent_low_rating_outweighs_older_high_ratings(config: ScoringConfig) {
        // Newest first: the 1 was recorded last.
        let result = historical_success(&entries(&[1, 5, 5, 5, 5]), &config);
        let weights = [1.0, 0.8, 0.64, 0.512, 0.4096];
        let total: f64 = weights.iter().sum();
        let expected = (0.0 + 100.0 * (total - 1.0)) / total;
        assert!((result.value - expected).abs() < 1e-9, "got {}", result.value);
        assert!(result.value > 50.0 && result.value < 100.0);
        assert!((result.support - 5.0 / 30.0).abs() < 1e-12);
    }

    #[rstest]
    fn uniform_ratings_map_directly(config: ScoringConfig) {
        let result = historical_success(&entries(&[4, 4, 4]), &config);
        assert!((result.value - 75.0).abs() < 1e-9);
        let brand = brand_fit(&entries(&[4, 4, 4]), &config);
        assert!((brand.value - 100.0).abs() < 1e-9);
    }
}
