//! Outcome ingestion, aggregate recalculation and weight recalibration.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tandem_core::{
    BenchmarkVersion, CollaborationOutcome, CollaborationStats, Factor, OutcomeStore, Segment,
    WeightVersion,
};
use tandem_core::weights::WEIGHT_SUM_TOLERANCE;

use crate::config::RecalibrationConfig;
use crate::{IngestError, ScoringContext};

/// What ingesting one outcome changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    /// Segment the outcome was filed under, if it carried one.
    pub segment: Option<Segment>,
    /// The segment's ledger generation after the append.
    pub generation: Option<u64>,
}

/// Summary of one recalculation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecalculationReport {
    /// Benchmark version now served.
    pub benchmark_version: BenchmarkVersion,
    /// Segments in the new snapshot.
    pub segments: usize,
    /// New default weight version, when recalibration moved the weights.
    pub weights: Option<WeightVersion>,
}

/// Closes the loop from recorded collaborations back into scoring.
#[derive(Debug)]
pub struct FeedbackLoop<O> {
    outcomes: O,
    context: Arc<ScoringContext>,
}

impl<O: OutcomeStore> FeedbackLoop<O> {
    /// Feed `context` from `outcomes`.
    #[must_use]
    pub const fn new(outcomes: O, context: Arc<ScoringContext>) -> Self {
        Self { outcomes, context }
    }

    /// Validate, persist and fold in one outcome.
    ///
    /// The segment's ledger generation advances, so cached results whose
    /// historical factors drew on that segment are recomputed on next read.
    ///
    /// # Errors
    /// Returns [`IngestError::Invalid`] for outcomes that break an
    /// invariant and [`IngestError::Store`] when persisting fails. Nothing
    /// is folded in after an error.
    pub fn ingest(&self, outcome: &CollaborationOutcome) -> Result<IngestReceipt, IngestError> {
        if let Err(source) = outcome.validate() {
            log::warn!(
                "rejected outcome for connection '{}': {source}",
                outcome.connection_id
            );
            return Err(IngestError::Invalid {
                connection_id: outcome.connection_id.clone(),
                source,
            });
        }
        self.outcomes
            .append_outcome(outcome)
            .map_err(|source| IngestError::Store { source })?;
        Ok(self.fold(outcome))
    }

    /// Fold every stored outcome into fresh state without persisting again.
    ///
    /// Used at start-up to rebuild the benchmark windows and ledger from the
    /// outcome store. Invalid stored outcomes are skipped.
    ///
    /// # Errors
    /// Returns [`IngestError::Store`] when the store cannot be read.
    pub fn replay(&self) -> Result<usize, IngestError> {
        let outcomes = self
            .outcomes
            .outcomes()
            .map_err(|source| IngestError::Store { source })?;
        let mut folded = 0;
        for outcome in &outcomes {
            match outcome.validate() {
                Ok(()) => {
                    self.fold(outcome);
                    folded += 1;
                }
                Err(err) => log::warn!(
                    "skipping stored outcome '{}': {err}",
                    outcome.connection_id
                ),
            }
        }
        Ok(folded)
    }

    /// Recompute benchmarks and recalibrate default weights.
    ///
    /// # Errors
    /// Returns [`IngestError::Store`] when outcomes cannot be read.
    pub fn recalculate(&self) -> Result<RecalculationReport, IngestError> {
        self.recalculate_at(Utc::now())
    }

    /// [`FeedbackLoop::recalculate`] with an explicit timestamp.
    ///
    /// # Errors
    /// See [`FeedbackLoop::recalculate`].
    pub fn recalculate_at(&self, now: DateTime<Utc>) -> Result<RecalculationReport, IngestError> {
        let outcomes = self
            .outcomes
            .outcomes()
            .map_err(|source| IngestError::Store { source })?;
        let benchmark_version = self.context.benchmarks().recalculate_at(now);
        let segments = self.context.benchmarks().snapshot().len();
        let weights = self.recalibrate(&outcomes);
        Ok(RecalculationReport {
            benchmark_version,
            segments,
            weights,
        })
    }

    /// Statistics over every stored outcome.
    ///
    /// # Errors
    /// Returns [`IngestError::Store`] when outcomes cannot be read.
    pub fn stats(&self) -> Result<CollaborationStats, IngestError> {
        self.outcomes
            .outcomes()
            .map(|outcomes| CollaborationStats::from_outcomes(&outcomes))
            .map_err(|source| IngestError::Store { source })
    }

    fn fold(&self, outcome: &CollaborationOutcome) -> IngestReceipt {
        if !self.context.benchmarks().record_outcome(outcome) {
            log::debug!(
                "outcome '{}' carries no benchmark observation",
                outcome.connection_id
            );
        }
        IngestReceipt {
            segment: outcome.segment.clone(),
            generation: self.context.ledger().record(outcome),
        }
    }

    #[expect(
        clippy::float_arithmetic,
        reason = "weights are compared within a tolerance"
    )]
    fn recalibrate(&self, outcomes: &[CollaborationOutcome]) -> Option<WeightVersion> {
        let defaults = self.context.defaults();
        let settings = &self.context.config().recalibration;
        let raw = recalibrated_weights(outcomes, defaults.vocabulary(), settings)?;
        let current = defaults.current();
        let unchanged = raw.iter().all(|(factor, weight)| {
            (current.weight(*factor) - weight).abs() <= WEIGHT_SUM_TOLERANCE
        });
        if unchanged {
            return None;
        }
        match defaults.publish(&raw) {
            Ok(version) => Some(version),
            Err(err) => {
                log::warn!("recalibrated weights rejected: {err}");
                None
            }
        }
    }
}

/// Default weights implied by successful outcomes.
///
/// Starting from uniform weights, every factor whose mean snapshot score
/// among successful outcomes exceeds the success signal is multiplied by
/// the boost. The result is normalised with no weight above the cap.
/// Returns `None` until enough successful outcomes carry snapshots, or when
/// the cap cannot be met over `vocabulary`.
///
/// The baseline is always uniform, so the result depends only on the
/// outcomes and repeated recalculation over the same outcomes is stable.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "recalibration scales and renormalises weights"
)]
pub fn recalibrated_weights(
    outcomes: &[CollaborationOutcome],
    vocabulary: &[Factor],
    settings: &RecalibrationConfig,
) -> Option<BTreeMap<Factor, f64>> {
    let successes: Vec<&CollaborationOutcome> = outcomes
        .iter()
        .filter(|o| o.is_successful() && !o.factors_at_match.is_empty())
        .collect();
    if successes.is_empty() || successes.len() < settings.min_successful_outcomes {
        return None;
    }
    let count = successes.len() as f64;
    let boosted: BTreeMap<Factor, f64> = vocabulary
        .iter()
        .map(|factor| {
            let mean = successes
                .iter()
                .map(|o| o.factors_at_match.score_or_neutral(*factor))
                .sum::<f64>()
                / count;
            let weight = if mean > settings.success_signal {
                settings.boost
            } else {
                1.0
            };
            (*factor, weight)
        })
        .collect();
    capped_shares(&boosted, settings.cap)
}

/// Normalise `raw` so that no share exceeds `cap`.
///
/// Shares over the cap are pinned to it and the remainder is spread over
/// the other factors in proportion to their raw weight, repeating until no
/// share is over. `None` when `cap` times the factor count is below one.
#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "shares are proportional splits of the unit total"
)]
fn capped_shares(raw: &BTreeMap<Factor, f64>, cap: f64) -> Option<BTreeMap<Factor, f64>> {
    if raw.is_empty() || cap * (raw.len() as f64) < 1.0 {
        return None;
    }
    let mut pinned = BTreeSet::new();
    loop {
        let free_total: f64 = raw
            .iter()
            .filter(|(factor, _)| !pinned.contains(*factor))
            .map(|(_, weight)| weight)
            .sum();
        if free_total <= 0.0 {
            return (pinned.len() == raw.len())
                .then(|| raw.keys().map(|factor| (*factor, cap)).collect());
        }
        let remaining = 1.0 - cap * (pinned.len() as f64);
        let shares: BTreeMap<Factor, f64> = raw
            .iter()
            .map(|(factor, weight)| {
                let share = if pinned.contains(factor) {
                    cap
                } else {
                    weight / free_total * remaining
                };
                (*factor, share)
            })
            .collect();
        let over: Vec<Factor> = shares
            .iter()
            .filter(|(factor, share)| !pinned.contains(*factor) && **share > cap)
            .map(|(factor, _)| *factor)
            .collect();
        if over.is_empty() {
            return Some(shares);
        }
        pinned.extend(over);
    }
}

#[cfg(test)]
#[expect(
    clippy::float_arithmetic,
    reason = "assertions compare recalibrated weights"
)]
mod tests {
    use super::*;
    use crate::ScoringConfig;
    use rstest::{fixture, rstest};
    use tandem_core::test_support::{fitness_micro, outcome};
    use tandem_core::{FactorSet, MemoryOutcomeStore};

    #[fixture]
    fn feedback() -> FeedbackLoop<MemoryOutcomeStore> {
        let config = ScoringConfig {
            recalibration: RecalibrationConfig {
                min_successful_outcomes: 2,
                ..RecalibrationConfig::default()
            },
            ..ScoringConfig::default()
        };
        let context = Arc::new(ScoringContext::new(config).expect("context"));
        FeedbackLoop::new(MemoryOutcomeStore::default(), context)
    }

    fn with_budget_signal(connection: &str, rating: u8) -> CollaborationOutcome {
        let mut recorded = outcome(connection, rating);
        recorded.factors_at_match = Factor::AUGMENTED
            .iter()
            .map(|f| {
                let score = if *f == Factor::BudgetAlignment { 95.0 } else { 50.0 };
                (*f, score)
            })
            .collect::<FactorSet>();
        recorded
    }

    #[rstest]
    fn ingest_advances_segment_generation(feedback: FeedbackLoop<MemoryOutcomeStore>) {
        let receipt = feedback.ingest(&outcome("c-1", 5)).expect("ingest");
        assert_eq!(receipt.segment, Some(fitness_micro()));
        assert_eq!(receipt.generation, Some(1));
        assert_eq!(feedback.stats().expect("stats").total, 1);
    }

    #[rstest]
    fn invalid_outcome_is_not_folded(feedback: FeedbackLoop<MemoryOutcomeStore>) {
        let err = feedback.ingest(&outcome("c-1", 9)).expect_err("invalid");
        assert!(matches!(err, IngestError::Invalid { .. }));
        assert_eq!(feedback.stats().expect("stats").total, 0);
        assert_eq!(
            feedback.context.ledger().generation(Some(&fitness_micro())),
            0
        );
    }

    #[rstest]
    fn recalculation_bumps_benchmark_version(feedback: FeedbackLoop<MemoryOutcomeStore>) {
        let mut observed = outcome("c-1", 4);
        observed.creator_engagement = Some(3.5);
        feedback.ingest(&observed).expect("ingest");
        let report = feedback.recalculate().expect("recalculate");
        assert_eq!(report.benchmark_version, BenchmarkVersion(1));
        assert_eq!(report.segments, 1);
        assert_eq!(report.weights, None);
    }

    #[rstest]
    fn predictive_factors_gain_weight_once(feedback: FeedbackLoop<MemoryOutcomeStore>) {
        for (i, rating) in [5, 4, 5].into_iter().enumerate() {
            feedback
                .ingest(&with_budget_signal(&format!("c-{i}"), rating))
                .expect("ingest");
        }
        let first = feedback.recalculate().expect("recalculate");
        assert_eq!(first.weights, Some(WeightVersion::default_at(1)));
        let defaults = feedback.context.defaults().current();
        assert!(defaults.weight(Factor::BudgetAlignment) > defaults.weight(Factor::BrandFit));
        assert!(defaults.is_normalised());

        let second = feedback.recalculate().expect("recalculate");
        assert_eq!(second.weights, None);
    }

    #[rstest]
    fn cap_limits_single_weights() {
        let settings = RecalibrationConfig {
            min_successful_outcomes: 1,
            boost: 100.0,
            cap: 0.3,
            ..RecalibrationConfig::default()
        };
        let weights = recalibrated_weights(
            &[with_budget_signal("c", 5)],
            &Factor::BASE,
            &settings,
        )
        .expect("weights");
        let budget = weights.get(&Factor::BudgetAlignment).copied().unwrap_or(0.0);
        let others = weights.get(&Factor::PlatformOverlap).copied().unwrap_or(0.0);
        // Budget is pinned at the cap; the other four split the remaining 0.7.
        assert!((budget - 0.3).abs() < 1e-12);
        assert!((others - 0.175).abs() < 1e-12);
        assert!(weights.values().all(|w| *w <= 0.3 + 1e-12));
        assert!((weights.values().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[rstest]
    fn cap_spreads_excess_until_every_weight_fits() {
        let raw = BTreeMap::from([
            (Factor::BudgetAlignment, 100.0),
            (Factor::NicheCompatibility, 10.0),
            (Factor::PlatformOverlap, 1.0),
            (Factor::AudienceMatch, 1.0),
            (Factor::EngagementQuality, 1.0),
        ]);
        // Niche only exceeds the cap once budget's excess is handed on.
        let shares = capped_shares(&raw, 0.25).expect("cap is reachable");
        let share = |factor: Factor| shares.get(&factor).copied().unwrap_or(0.0);
        assert!((share(Factor::BudgetAlignment) - 0.25).abs() < 1e-12);
        assert!((share(Factor::NicheCompatibility) - 0.25).abs() < 1e-12);
        assert!((share(Factor::PlatformOverlap) - 0.5 / 3.0).abs() < 1e-12);
        assert!(shares.values().all(|w| *w <= 0.25 + 1e-12));
        assert!((shares.values().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[rstest]
    fn unreachable_cap_yields_no_weights() {
        let settings = RecalibrationConfig {
            min_successful_outcomes: 1,
            cap: 0.1,
            ..RecalibrationConfig::default()
        };
        assert!(
            recalibrated_weights(&[with_budget_signal("c", 5)], &Factor::BASE, &settings)
                .is_none()
        );
    }
}
