//! Tunable constants for scoring, benchmarks and recalibration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tandem_core::Factor;

use crate::ConfigError;

/// Controls how outcome statistics move the default weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecalibrationConfig {
    /// Successful outcomes required before weights move.
    pub min_successful_outcomes: usize,
    /// Mean snapshot score above which a factor counts as predictive.
    pub success_signal: f64,
    /// Multiplier applied to predictive factors.
    pub boost: f64,
    /// Upper bound for any single recalibrated default weight.
    ///
    /// Must be at least one over the vocabulary size.
    pub cap: f64,
}

impl Default for RecalibrationConfig {
    fn default() -> Self {
        Self {
            min_successful_outcomes: 10,
            success_signal: 70.0,
            boost: 1.1,
            cap: 0.5,
        }
    }
}

/// Engine-wide scoring configuration.
///
/// Every key is optional when deserialising; missing keys take the defaults
/// below.
///
/// # Examples
/// ```
/// use tandem_scorer::ScoringConfig;
///
/// let config: ScoringConfig = serde_json::from_str(r#"{"augmented": false}"#).unwrap();
/// assert!(!config.augmented);
/// assert_eq!(config.strength_threshold, 75.0);
/// assert_eq!(config.vocabulary().len(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    /// Score with the history-derived factors as well as the base five.
    pub augmented: bool,
    /// Factor score at or above which a strength is reported.
    pub strength_threshold: f64,
    /// Factor score at or below which a weakness is reported.
    pub weakness_threshold: f64,
    /// Minimum niche compatibility for unrelated niches.
    pub niche_floor: f64,
    /// Sample size at which benchmark and history confidence saturate.
    pub min_sample_for_full_confidence: u32,
    /// Trailing observations kept per segment for benchmarks.
    pub benchmark_window: usize,
    /// Trailing outcomes kept per segment for historical factors.
    pub history_window: usize,
    /// Outcomes required before historical factors leave neutral.
    pub history_min_outcomes: usize,
    /// Per-step decay applied from the newest outcome to older ones.
    pub recency_decay: f64,
    /// Log10 distance from the requested band at which audience match is 0.
    pub audience_span_decades: f64,
    /// Default weight recalibration.
    pub recalibration: RecalibrationConfig,
    /// How long a request waits on an in-flight computation of the same key.
    pub single_flight_timeout_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            augmented: true,
            strength_threshold: 75.0,
            weakness_threshold: 35.0,
            niche_floor: 10.0,
            min_sample_for_full_confidence: 30,
            benchmark_window: 500,
            history_window: 200,
            history_min_outcomes: 3,
            recency_decay: 0.8,
            audience_span_decades: 2.0,
            recalibration: RecalibrationConfig::default(),
            single_flight_timeout_ms: 2_000,
        }
    }
}

impl ScoringConfig {
    /// The factor vocabulary scored under this configuration.
    #[must_use]
    pub fn vocabulary(&self) -> &'static [Factor] {
        Factor::vocabulary(self.augmented)
    }

    /// Wait bound for single-flight followers.
    #[must_use]
    pub const fn single_flight_timeout(&self) -> Duration {
        Duration::from_millis(self.single_flight_timeout_ms)
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        reason = "the cap must leave room for every factor"
    )]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let score = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        let factors = self.vocabulary().len() as f64;
        let checks: [(bool, &'static str, &'static str); 10] = [
            (
                score(self.strength_threshold),
                "strengthThreshold",
                "must be a score in 0..=100",
            ),
            (
                score(self.weakness_threshold),
                "weaknessThreshold",
                "must be a score in 0..=100",
            ),
            (
                self.weakness_threshold < self.strength_threshold,
                "weaknessThreshold",
                "must be below strengthThreshold",
            ),
            (
                score(self.niche_floor),
                "nicheFloor",
                "must be a score in 0..=100",
            ),
            (
                self.recency_decay > 0.0 && self.recency_decay <= 1.0,
                "recencyDecay",
                "must be in (0, 1]",
            ),
            (
                self.audience_span_decades.is_finite() && self.audience_span_decades > 0.0,
                "audienceSpanDecades",
                "must be positive",
            ),
            (
                self.benchmark_window > 0 && self.history_window > 0,
                "benchmarkWindow",
                "windows must hold at least one entry",
            ),
            (
                self.recalibration.boost.is_finite() && self.recalibration.boost >= 1.0,
                "recalibration.boost",
                "must be at least 1",
            ),
            (
                self.recalibration.cap > 0.0 && self.recalibration.cap <= 1.0,
                "recalibration.cap",
                "must be in (0, 1]",
            ),
            (
                self.recalibration.cap * factors >= 1.0,
                "recalibration.cap",
                "must allow the weights to sum to one",
            ),
        ];
        checks
            .into_iter()
            .find(|(ok, _, _)| !ok)
            .map_or(Ok(()), |(_, field, reason)| {
                Err(ConfigError::Invalid { field, reason })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn defaults_are_valid() {
        assert!(ScoringConfig::default().validate().is_ok());
    }

    #[rstest]
    fn nested_keys_use_camel_case() {
        let json = r#"{"recalibration": {"minSuccessfulOutcomes": 2}, "recencyDecay": 0.5}"#;
        let config: ScoringConfig = serde_json::from_str(json).expect("parse config");
        assert_eq!(config.recalibration.min_successful_outcomes, 2);
        assert_eq!(config.recalibration.boost, 1.1);
        assert_eq!(config.recency_decay, 0.5);
    }

    #[rstest]
    #[case(r#"{"recencyDecay": 0.0}"#, "recencyDecay")]
    #[case(r#"{"weaknessThreshold": 80.0}"#, "weaknessThreshold")]
    #[case(r#"{"recalibration": {"cap": 1.5}}"#, "recalibration.cap")]
    #[case(r#"{"recalibration": {"cap": 0.1}}"#, "recalibration.cap")]
    fn rejects_unusable_values(#[case] json: &str, #[case] expected: &str) {
        let config: ScoringConfig = serde_json::from_str(json).expect("parse config");
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected invalid {expected}, got {other:?}"),
        }
    }
}
