//! Weighted aggregation of factor scores into a [`MatchResult`].

use chrono::{DateTime, Utc};
use tandem_core::{Factor, FactorSet, MatchResult, MatchTier, Profile, WeightVector};

use crate::ScoringConfig;
use crate::factors::{FactorEvaluation, Pairing, ScoringInputs, evaluate};

/// Strength template for `factor`.
#[must_use]
pub const fn strength_text(factor: Factor) -> &'static str {
    match factor {
        Factor::NicheCompatibility => "Content niche closely matches the brand's industry",
        Factor::BudgetAlignment => "Creator rates fit comfortably within the budget",
        Factor::PlatformOverlap => "Active on the platforms the campaign targets",
        Factor::AudienceMatch => "Audience size sits in the requested range",
        Factor::EngagementQuality => "Engagement is strong for the niche and tier",
        Factor::BrandFit => "Similar collaborations tend to be repeated",
        Factor::HistoricalSuccess => "Similar collaborations have rated highly",
    }
}

/// Weakness template for `factor`.
#[must_use]
pub const fn weakness_text(factor: Factor) -> &'static str {
    match factor {
        Factor::NicheCompatibility => "Niche is unrelated to the brand's industry",
        Factor::BudgetAlignment => "Creator rates fall outside the budget",
        Factor::PlatformOverlap => "Little overlap in platforms",
        Factor::AudienceMatch => "Audience size is far from the requested range",
        Factor::EngagementQuality => "Engagement is weak for the niche and tier",
        Factor::BrandFit => "Similar collaborations are rarely repeated",
        Factor::HistoricalSuccess => "Similar collaborations have rated poorly",
    }
}

/// Weighted sum of factor values, rounded into `0..=100`.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "the score is a weighted sum of factor values"
)]
pub fn weighted_score(evaluation: &FactorEvaluation, weights: &WeightVector) -> u8 {
    let sum: f64 = evaluation
        .iter()
        .map(|(factor, score)| weights.weight(*factor) * score.value)
        .sum();
    to_percent(sum)
}

/// Mean factor support as a percentage.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "confidence is the mean support scaled to a percentage"
)]
pub fn confidence(evaluation: &FactorEvaluation) -> u8 {
    if evaluation.is_empty() {
        return 0;
    }
    let total: f64 = evaluation.values().map(|score| score.support).sum();
    to_percent(100.0 * total / evaluation.len() as f64)
}

/// Logistic estimate of collaboration success for a final score.
///
/// # Examples
/// ```
/// use tandem_scorer::aggregate::success_probability;
///
/// assert_eq!(success_probability(50), 50);
/// assert!(success_probability(90) > 90);
/// ```
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "logistic curve centred on the neutral score"
)]
pub fn success_probability(score: u8) -> u8 {
    let x = (f64::from(score) - 50.0) / 15.0;
    to_percent(100.0 / (1.0 + (-x).exp()))
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "value is clamped into 0..=100 before conversion"
)]
fn to_percent(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// Strengths and weaknesses in presentation order.
///
/// Only factors carrying weight are reported. Strengths are ordered by
/// their contribution to the score, weaknesses weakest first.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "strengths are ranked by weighted contribution"
)]
pub fn explain(
    evaluation: &FactorEvaluation,
    weights: &WeightVector,
    config: &ScoringConfig,
) -> (Vec<String>, Vec<String>) {
    let mut strengths: Vec<(Factor, f64)> = evaluation
        .iter()
        .filter(|(factor, score)| {
            weights.weight(**factor) > 0.0 && score.value >= config.strength_threshold
        })
        .map(|(factor, score)| (*factor, weights.weight(*factor) * score.value))
        .collect();
    strengths.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut weaknesses: Vec<(Factor, f64)> = evaluation
        .iter()
        .filter(|(factor, score)| {
            weights.weight(**factor) > 0.0 && score.value <= config.weakness_threshold
        })
        .map(|(factor, score)| (*factor, score.value))
        .collect();
    weaknesses.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    (
        strengths
            .into_iter()
            .map(|(factor, _)| strength_text(factor).to_owned())
            .collect(),
        weaknesses
            .into_iter()
            .map(|(factor, _)| weakness_text(factor).to_owned())
            .collect(),
    )
}

/// Fold an evaluation into an immutable result.
#[must_use]
pub fn assemble(
    subject: &Profile,
    candidate: &Profile,
    evaluation: &FactorEvaluation,
    weights: &WeightVector,
    config: &ScoringConfig,
    computed_at: DateTime<Utc>,
) -> MatchResult {
    let score = weighted_score(evaluation, weights);
    let (reasoning, weaknesses) = explain(evaluation, weights, config);
    MatchResult {
        subject_id: subject.id.clone(),
        candidate_id: candidate.id.clone(),
        score,
        confidence: confidence(evaluation),
        tier: MatchTier::from_score(score),
        success_probability: success_probability(score),
        factors: evaluation
            .iter()
            .map(|(factor, score)| (*factor, score.value))
            .collect::<FactorSet>(),
        weights_used: weights.clone(),
        reasoning,
        weaknesses,
        computed_at,
    }
}

/// Score `subject` against `candidate`.
///
/// Pure: the same profiles, weights, inputs and timestamp always produce
/// the same result.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use tandem_core::{Benchmark, Profile, Role, WeightVector};
/// use tandem_scorer::ScoringConfig;
/// use tandem_scorer::aggregate::score;
/// use tandem_scorer::factors::ScoringInputs;
///
/// let now = Utc::now();
/// let creator = Profile::new("c", Role::Creator, now);
/// let brand = Profile::new("o", Role::Organization, now);
/// let config = ScoringConfig::default();
/// let benchmark = Benchmark::neutral();
/// let inputs = ScoringInputs { benchmark: &benchmark, history: &[], config: &config };
/// let result = score(&creator, &brand, &WeightVector::default(), inputs, now);
/// assert_eq!(result.score, 50);
/// assert_eq!(result.confidence, 0);
/// ```
#[must_use]
pub fn score(
    subject: &Profile,
    candidate: &Profile,
    weights: &WeightVector,
    inputs: ScoringInputs<'_>,
    computed_at: DateTime<Utc>,
) -> MatchResult {
    let evaluation = evaluate(Pairing::orient(subject, candidate), inputs);
    assemble(
        subject,
        candidate,
        &evaluation,
        weights,
        inputs.config,
        computed_at,
    )
}

#[cfg(test)]
#[expect(
    clippy::float_arithmetic,
    reason = "expected scores are computed from factor values"
)]
mod tests {
    use super::*;
    use crate::factors::FactorScore;
    use rstest::rstest;
    use tandem_core::test_support::{creator, fixed_time, organization};
    use tandem_core::{Benchmark, PriceRange, WeightVersion};

    fn evaluation(pairs: &[(Factor, f64, f64)]) -> FactorEvaluation {
        pairs
            .iter()
            .map(|(factor, value, support)| (*factor, FactorScore::supported(*value, *support)))
            .collect()
    }

    fn base_weights() -> WeightVector {
        WeightVector::uniform(&Factor::BASE, WeightVersion::default_at(0)).expect("weights")
    }

    #[rstest]
    fn score_is_rounded_weighted_mean() {
        let eval = evaluation(&[
            (Factor::NicheCompatibility, 100.0, 1.0),
            (Factor::BudgetAlignment, 100.0, 1.0),
            (Factor::PlatformOverlap, 100.0 / 3.0, 1.0),
            (Factor::AudienceMatch, 100.0, 1.0),
            (Factor::EngagementQuality, 50.0, 0.0),
        ]);
        // (100 + 100 + 33.33 + 100 + 50) / 5 = 76.67
        assert_eq!(weighted_score(&eval, &base_weights()), 77);
        assert_eq!(confidence(&eval), 80);
    }

    #[rstest]
    #[case(50, 50)]
    #[case(80, 88)]
    #[case(20, 12)]
    fn success_probability_is_logistic(#[case] score: u8, #[case] expected: u8) {
        assert_eq!(success_probability(score), expected);
    }

    #[rstest]
    fn explanation_orders_by_contribution_and_weakness() {
        let eval = evaluation(&[
            (Factor::NicheCompatibility, 80.0, 1.0),
            (Factor::BudgetAlignment, 95.0, 1.0),
            (Factor::PlatformOverlap, 10.0, 1.0),
            (Factor::AudienceMatch, 30.0, 1.0),
            (Factor::EngagementQuality, 50.0, 1.0),
        ]);
        let (strengths, weaknesses) = explain(&eval, &base_weights(), &ScoringConfig::default());
        assert_eq!(
            strengths,
            [
                strength_text(Factor::BudgetAlignment),
                strength_text(Factor::NicheCompatibility)
            ]
        );
        assert_eq!(
            weaknesses,
            [
                weakness_text(Factor::PlatformOverlap),
                weakness_text(Factor::AudienceMatch)
            ]
        );
    }

    #[rstest]
    fn zero_weight_factors_are_not_explained() {
        let eval = evaluation(&[
            (Factor::BudgetAlignment, 100.0, 1.0),
            (Factor::PlatformOverlap, 0.0, 1.0),
        ]);
        let raw = [(Factor::BudgetAlignment, 1.0)].into_iter().collect();
        let weights = WeightVector::normalised(&raw, &Factor::BASE, WeightVersion::custom_at(1))
            .expect("weights");
        let (strengths, weaknesses) = explain(&eval, &weights, &ScoringConfig::default());
        assert_eq!(strengths.len(), 1);
        assert!(weaknesses.is_empty());
    }

    #[rstest]
    fn fixture_pair_scores_exactly() {
        let config = ScoringConfig {
            augmented: false,
            ..ScoringConfig::default()
        };
        let subject = creator("c").with_rate(PriceRange::point(3_000.0));
        let candidate = organization("o");
        let benchmark = Benchmark::neutral();
        let inputs = ScoringInputs {
            benchmark: &benchmark,
            history: &[],
            config: &config,
        };
        let result = score(&subject, &candidate, &base_weights(), inputs, fixed_time());

        assert_eq!(result.factors.get(Factor::BudgetAlignment), Some(100.0));
        assert_eq!(result.factors.get(Factor::PlatformOverlap).map(f64::round), Some(33.0));
        let mean = result.factors.iter().map(|(_, v)| v).sum::<f64>() / 5.0;
        assert_eq!(f64::from(result.score), mean.round());
        assert_eq!(result.tier, MatchTier::from_score(result.score));
        assert_eq!(result.computed_at, fixed_time());
    }
}
