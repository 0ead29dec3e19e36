//! Factor calculators.
//!
//! Each calculator is a pure function of the oriented pair, the creator's
//! segment benchmark and, for the historical factors, the segment's ledger
//! entries. Calculators return a [`FactorScore`]: the value in `0..=100`
//! and how strongly the inputs support it, which feeds match confidence.

use std::collections::BTreeMap;

use tandem_core::{Benchmark, Factor, NEUTRAL_SCORE, Profile, Role};

use crate::ScoringConfig;
use crate::ledger::LedgerEntry;

pub mod audience;
pub mod budget;
pub mod engagement;
pub mod history;
pub mod niche;
pub mod platform;

/// A factor value together with the support behind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorScore {
    /// Score in `0..=100`.
    pub value: f64,
    /// Support in `0..=1`; zero when the score is a neutral substitute.
    pub support: f64,
}

impl FactorScore {
    /// Neutral score substituted for missing inputs.
    #[must_use]
    pub const fn uninformed() -> Self {
        Self {
            value: NEUTRAL_SCORE,
            support: 0.0,
        }
    }

    /// Score computed from complete profile data.
    #[must_use]
    pub const fn informed(value: f64) -> Self {
        Self {
            value,
            support: 1.0,
        }
    }

    /// Score whose inputs are only partially trusted.
    #[must_use]
    pub const fn supported(value: f64, support: f64) -> Self {
        Self { value, support }
    }

    /// Clamp the value into `0..=100` and the support into `0..=1`.
    #[must_use]
    pub fn bounded(self) -> Self {
        if !self.value.is_finite() || !self.support.is_finite() {
            return Self::uninformed();
        }
        Self {
            value: self.value.clamp(0.0, 100.0),
            support: self.support.clamp(0.0, 1.0),
        }
    }
}

/// Per-factor scores for one pair.
pub type FactorEvaluation = BTreeMap<Factor, FactorScore>;

/// A subject/candidate pair seen as creator and organisation.
#[derive(Debug, Clone, Copy)]
pub struct Pairing<'a> {
    /// Profile supplying creator attributes.
    pub creator: &'a Profile,
    /// Profile supplying budget and audience requirements.
    pub organization: &'a Profile,
}

impl<'a> Pairing<'a> {
    /// Orient a request by role.
    ///
    /// The organisation-role profile supplies budget and audience
    /// requirements. When both profiles share a role the subject is treated
    /// as the creator.
    #[must_use]
    pub fn orient(subject: &'a Profile, candidate: &'a Profile) -> Self {
        if subject.role == Role::Organization && candidate.role != Role::Organization {
            Self {
                creator: candidate,
                organization: subject,
            }
        } else {
            Self {
                creator: subject,
                organization: candidate,
            }
        }
    }
}

/// Inputs shared by every calculator for one scoring request.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInputs<'a> {
    /// Benchmark for the creator's segment.
    pub benchmark: &'a Benchmark,
    /// Ledger entries for the creator's segment, newest first.
    pub history: &'a [LedgerEntry],
    /// Active configuration.
    pub config: &'a ScoringConfig,
}

/// Run every calculator in the configured vocabulary.
#[must_use]
pub fn evaluate(pairing: Pairing<'_>, inputs: ScoringInputs<'_>) -> FactorEvaluation {
    let Pairing {
        creator,
        organization,
    } = pairing;
    let config = inputs.config;
    config
        .vocabulary()
        .iter()
        .map(|factor| {
            let score = match factor {
                Factor::NicheCompatibility => niche::score(
                    creator.niche_label(),
                    organization.niche_label(),
                    config.niche_floor,
                ),
                Factor::BudgetAlignment => budget::score(
                    creator.rate,
                    inputs.benchmark,
                    organization.budget,
                ),
                Factor::PlatformOverlap => {
                    platform::score(&creator.platforms, &organization.platforms)
                }
                Factor::AudienceMatch => audience::score(
                    creator.audience_size,
                    organization.desired_audience,
                    config.audience_span_decades,
                ),
                Factor::EngagementQuality => {
                    engagement::score(creator.engagement_rate, inputs.benchmark)
                }
                Factor::BrandFit => history::brand_fit(inputs.history, config),
                Factor::HistoricalSuccess => history::historical_success(inputs.history, config),
            };
            (*factor, score.bounded())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tandem_core::test_support::{creator, organization};

    #[rstest]
    fn orientation_follows_roles() {
        let c = creator("c");
        let o = organization("o");
        assert_eq!(Pairing::orient(&o, &c).creator.id, c.id);
        assert_eq!(Pairing::orient(&c, &o).creator.id, c.id);

        let other = creator("c2");
        assert_eq!(Pairing::orient(&c, &other).creator.id, c.id);
    }

    #[rstest]
    fn evaluation_covers_the_vocabulary() {
        let config = ScoringConfig::default();
        let benchmark = Benchmark::neutral();
        let c = creator("c");
        let o = organization("o");
        let evaluation = evaluate(
            Pairing::orient(&o, &c),
            ScoringInputs {
                benchmark: &benchmark,
                history: &[],
                config: &config,
            },
        );
        assert_eq!(evaluation.len(), 7);
        assert_eq!(
            evaluation.get(&Factor::HistoricalSuccess),
            Some(&FactorScore::uninformed())
        );
    }

    #[rstest]
    #[case(f64::NAN, 0.5, FactorScore::uninformed())]
    #[case(140.0, 2.0, FactorScore::informed(100.0))]
    #[case(-5.0, 0.5, FactorScore::supported(0.0, 0.5))]
    fn bounding_clamps_values(#[case] value: f64, #[case] support: f64, #[case] expected: FactorScore) {
        assert_eq!(FactorScore::supported(value, support).bounded(), expected);
    }
}
