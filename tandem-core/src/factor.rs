//! Factor vocabulary and per-pair factor score maps.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Score assigned to a factor when there is no data to judge it.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Named dimension of compatibility.
///
/// The base vocabulary has five factors; augmented scoring adds two
/// history-derived factors. Declaration order is the canonical ordering used
/// by reports and serialised maps.
///
/// # Examples
/// ```
/// use tandem_core::Factor;
///
/// assert_eq!(Factor::vocabulary(false).len(), 5);
/// assert_eq!(Factor::vocabulary(true).len(), 7);
/// assert_eq!("budgetAlignment".parse::<Factor>(), Ok(Factor::BudgetAlignment));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Factor {
    /// Creator niche against organisation industry.
    NicheCompatibility,
    /// Creator rate against organisation budget.
    BudgetAlignment,
    /// Shared platforms.
    PlatformOverlap,
    /// Creator audience size against the requested band.
    AudienceMatch,
    /// Creator engagement against the segment benchmark.
    EngagementQuality,
    /// Repeat-collaboration signal from recorded outcomes.
    BrandFit,
    /// Recency-weighted satisfaction from recorded outcomes.
    HistoricalSuccess,
}

impl Factor {
    /// Factors computed in base scoring.
    pub const BASE: [Self; 5] = [
        Self::NicheCompatibility,
        Self::BudgetAlignment,
        Self::PlatformOverlap,
        Self::AudienceMatch,
        Self::EngagementQuality,
    ];

    /// Factors computed in augmented scoring.
    pub const AUGMENTED: [Self; 7] = [
        Self::NicheCompatibility,
        Self::BudgetAlignment,
        Self::PlatformOverlap,
        Self::AudienceMatch,
        Self::EngagementQuality,
        Self::BrandFit,
        Self::HistoricalSuccess,
    ];

    /// The configured factor vocabulary.
    pub fn vocabulary(augmented: bool) -> &'static [Self] {
        if augmented {
            &Self::AUGMENTED
        } else {
            &Self::BASE
        }
    }

    /// Whether the factor is derived from recorded outcomes.
    pub const fn is_historical(self) -> bool {
        matches!(self, Self::BrandFit | Self::HistoricalSuccess)
    }

    /// Wire name of the factor.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NicheCompatibility => "nicheCompatibility",
            Self::BudgetAlignment => "budgetAlignment",
            Self::PlatformOverlap => "platformOverlap",
            Self::AudienceMatch => "audienceMatch",
            Self::EngagementQuality => "engagementQuality",
            Self::BrandFit => "brandFit",
            Self::HistoricalSuccess => "historicalSuccess",
        }
    }

    /// Human-readable label used in reasoning strings.
    pub const fn label(self) -> &'static str {
        match self {
            Self::NicheCompatibility => "niche compatibility",
            Self::BudgetAlignment => "budget alignment",
            Self::PlatformOverlap => "platform overlap",
            Self::AudienceMatch => "audience match",
            Self::EngagementQuality => "engagement quality",
            Self::BrandFit => "brand fit",
            Self::HistoricalSuccess => "historical success",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a factor name fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown factor '{name}'")]
pub struct UnknownFactor {
    /// The name that failed to parse.
    pub name: String,
}

impl FromStr for Factor {
    type Err = UnknownFactor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::AUGMENTED
            .into_iter()
            .find(|factor| factor.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownFactor {
                name: s.to_owned(),
            })
    }
}

/// Scores for one pair, one entry per factor, each in `0..=100`.
///
/// Values outside the range are clamped on insertion and non-finite values
/// are replaced with [`NEUTRAL_SCORE`], so a `FactorSet` never holds an
/// out-of-range score.
///
/// # Examples
/// ```
/// use tandem_core::{Factor, FactorSet};
///
/// let mut set = FactorSet::default();
/// set.insert(Factor::PlatformOverlap, 140.0);
/// set.insert(Factor::BudgetAlignment, f64::NAN);
/// assert_eq!(set.get(Factor::PlatformOverlap), Some(100.0));
/// assert_eq!(set.get(Factor::BudgetAlignment), Some(50.0));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactorSet(BTreeMap<Factor, f64>);

impl FactorSet {
    /// Every factor in `factors` at the neutral score.
    pub fn neutral(factors: &[Factor]) -> Self {
        let mut set = Self::default();
        for factor in factors {
            set.insert(*factor, NEUTRAL_SCORE);
        }
        set
    }

    /// Store a score, clamping it into `0..=100`.
    pub fn insert(&mut self, factor: Factor, score: f64) {
        let value = if score.is_finite() {
            score.clamp(0.0, 100.0)
        } else {
            NEUTRAL_SCORE
        };
        self.0.insert(factor, value);
    }

    /// Score for `factor`, if computed.
    pub fn get(&self, factor: Factor) -> Option<f64> {
        self.0.get(&factor).copied()
    }

    /// Score for `factor`, or the neutral score when absent.
    pub fn score_or_neutral(&self, factor: Factor) -> f64 {
        self.get(factor).unwrap_or(NEUTRAL_SCORE)
    }

    /// Iterate scores in canonical factor order.
    pub fn iter(&self) -> impl Iterator<Item = (Factor, f64)> + '_ {
        self.0.iter().map(|(factor, score)| (*factor, *score))
    }

    /// Number of scored factors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no factor has been scored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every score is finite and inside `0..=100`.
    ///
    /// Always true for sets built through [`FactorSet::insert`]; sets
    /// deserialised from untrusted input may fail it.
    pub fn is_in_range(&self) -> bool {
        self.0
            .values()
            .all(|score| score.is_finite() && (0.0..=100.0).contains(score))
    }
}

impl FromIterator<(Factor, f64)> for FactorSet {
    fn from_iter<T: IntoIterator<Item = (Factor, f64)>>(iter: T) -> Self {
        let mut set = Self::default();
        for (factor, score) in iter {
            set.insert(factor, score);
        }
        set
    }
}
