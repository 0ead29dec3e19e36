//! Recorded collaboration outcomes and summary statistics over them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Factor, FactorSet, ProfileId, Segment};

/// Lowest rating counted as a successful collaboration.
pub const SUCCESS_RATING: u8 = 4;

/// How far a collaboration got before it concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompletionStatus {
    /// All deliverables were produced.
    Completed,
    /// Some deliverables were produced.
    Partial,
    /// The collaboration was abandoned.
    Cancelled,
}

/// Errors raised when an outcome fails validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OutcomeValidationError {
    /// The rating was outside `1..=5`.
    #[error("success rating {rating} is outside 1..=5")]
    RatingOutOfRange {
        /// Supplied rating.
        rating: u8,
    },
    /// The connection identifier was blank.
    #[error("connection id is empty")]
    EmptyConnectionId,
    /// The reported ROI was NaN or infinite.
    #[error("roi achieved is not finite")]
    NonFiniteRoi,
    /// A factor snapshot value was not a finite score in `0..=100`.
    #[error("factor snapshot for {factor} is not a score in 0..=100")]
    NonFiniteFactor {
        /// Offending factor.
        factor: Factor,
    },
    /// A creator observation was negative or not finite.
    #[error("{field} must be a finite, non-negative number")]
    InvalidObservation {
        /// Name of the offending field.
        field: &'static str,
    },
}

/// Real-world result of a concluded collaboration.
///
/// Outcomes are immutable once recorded and are the sole input to the
/// feedback loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationOutcome {
    /// Connection the outcome concludes.
    pub connection_id: String,
    /// Creator niche/tier the collaboration belongs to, if known.
    #[serde(default)]
    pub segment: Option<Segment>,
    /// Satisfaction rating from 1 to 5.
    pub success_rating: u8,
    /// Completion status.
    pub completion_status: CompletionStatus,
    /// Return on investment, when reported.
    #[serde(default)]
    pub roi_achieved: Option<f64>,
    /// Whether the parties would collaborate again.
    pub would_collaborate_again: bool,
    /// Factor scores at the time the pair was matched.
    #[serde(default)]
    pub factors_at_match: FactorSet,
    /// Rate the creator was paid.
    #[serde(default)]
    pub creator_rate: Option<f64>,
    /// Creator engagement rate observed during the collaboration (percent).
    #[serde(default)]
    pub creator_engagement: Option<f64>,
    /// Participant who recorded the outcome.
    pub recorded_by: ProfileId,
    /// When the outcome was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl CollaborationOutcome {
    /// Check the outcome's invariants.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), OutcomeValidationError> {
        if !(1..=5).contains(&self.success_rating) {
            return Err(OutcomeValidationError::RatingOutOfRange {
                rating: self.success_rating,
            });
        }
        if self.connection_id.trim().is_empty() {
            return Err(OutcomeValidationError::EmptyConnectionId);
        }
        if self.roi_achieved.is_some_and(|roi| !roi.is_finite()) {
            return Err(OutcomeValidationError::NonFiniteRoi);
        }
        if let Some((factor, _)) = self
            .factors_at_match
            .iter()
            .find(|(_, score)| !score.is_finite() || !(0.0..=100.0).contains(score))
        {
            return Err(OutcomeValidationError::NonFiniteFactor { factor });
        }
        let invalid = |value: Option<f64>| value.is_some_and(|v| !v.is_finite() || v < 0.0);
        if invalid(self.creator_rate) {
            return Err(OutcomeValidationError::InvalidObservation {
                field: "creatorRate",
            });
        }
        if invalid(self.creator_engagement) {
            return Err(OutcomeValidationError::InvalidObservation {
                field: "creatorEngagement",
            });
        }
        Ok(())
    }

    /// Whether the collaboration counts as a success.
    pub const fn is_successful(&self) -> bool {
        self.success_rating >= SUCCESS_RATING
    }

    /// Rating mapped onto `0..=100`.
    pub fn rating_score(&self) -> f64 {
        (f64::from(self.success_rating.clamp(1, 5)) - 1.0) / 4.0 * 100.0
    }

    /// Repeat-collaboration signal in `0..=1`.
    pub fn brand_signal(&self) -> f64 {
        let again = if self.would_collaborate_again { 1.0 } else { 0.0 };
        let completed = if self.completion_status == CompletionStatus::Completed {
            1.0
        } else {
            0.0
        };
        0.5 * again + 0.5 * completed
    }
}

/// Summary statistics over a set of outcomes.
///
/// # Examples
/// ```
/// use tandem_core::CollaborationStats;
///
/// let stats = CollaborationStats::from_outcomes(&[]);
/// assert_eq!(stats.total, 0);
/// assert_eq!(stats.success_rate, 0.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationStats {
    /// Number of outcomes.
    pub total: usize,
    /// Outcomes rated 4 or 5.
    pub successful: usize,
    /// `successful / total`, zero when empty.
    pub success_rate: f64,
    /// Mean rating, zero when empty.
    pub average_rating: f64,
    /// Mean ROI over outcomes that reported one.
    pub average_roi: Option<f64>,
    /// Share of outcomes whose parties would collaborate again.
    pub would_collaborate_again_rate: f64,
}

impl CollaborationStats {
    /// Summarise `outcomes`.
    pub fn from_outcomes(outcomes: &[CollaborationOutcome]) -> Self {
        if outcomes.is_empty() {
            return Self::default();
        }
        let total = outcomes.len();
        let count = total as f64;
        let successful = outcomes.iter().filter(|o| o.is_successful()).count();
        let rating_sum: f64 = outcomes.iter().map(|o| f64::from(o.success_rating)).sum();
        let again = outcomes.iter().filter(|o| o.would_collaborate_again).count();
        let rois: Vec<f64> = outcomes.iter().filter_map(|o| o.roi_achieved).collect();
        let average_roi = (!rois.is_empty()).then(|| rois.iter().sum::<f64>() / rois.len() as f64);
        Self {
            total,
            successful,
            success_rate: successful as f64 / count,
            average_rating: rating_sum / count,
            average_roi,
            would_collaborate_again_rate: again as f64 / count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::outcome;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(6)]
    fn rejects_ratings_outside_scale(#[case] rating: u8) {
        let mut o = outcome("c-1", rating);
        o.success_rating = rating;
        assert_eq!(
            o.validate(),
            Err(OutcomeValidationError::RatingOutOfRange { rating })
        );
    }

    #[rstest]
    fn rejects_blank_connection() {
        let o = outcome("  ", 4);
        assert_eq!(o.validate(), Err(OutcomeValidationError::EmptyConnectionId));
    }

    #[rstest]
    fn rejects_non_finite_roi() {
        let mut o = outcome("c-1", 4);
        o.roi_achieved = Some(f64::NAN);
        assert_eq!(o.validate(), Err(OutcomeValidationError::NonFiniteRoi));
    }

    #[rstest]
    fn rejects_negative_rates() {
        let mut o = outcome("c-1", 4);
        o.creator_rate = Some(-10.0);
        assert_eq!(
            o.validate(),
            Err(OutcomeValidationError::InvalidObservation {
                field: "creatorRate"
            })
        );
    }

    #[rstest]
    #[case(1, 0.0)]
    #[case(3, 50.0)]
    #[case(5, 100.0)]
    fn maps_ratings_to_scores(#[case] rating: u8, #[case] expected: f64) {
        assert_eq!(outcome("c", rating).rating_score(), expected);
    }

    #[rstest]
    fn summarises_outcomes() {
        let mut first = outcome("a", 5);
        first.roi_achieved = Some(2.0);
        let mut second = outcome("b", 2);
        second.would_collaborate_again = false;
        let third = outcome("c", 4);

        let stats = CollaborationStats::from_outcomes(&[first, second, third]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.successful, 2);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!((stats.average_rating - 11.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats.average_roi, Some(2.0));
        assert!((stats.would_collaborate_again_rate - 2.0 / 3.0).abs() < 1e-12);
    }
}
