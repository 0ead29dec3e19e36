//! Normalised factor weight vectors and their provenance.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Factor, ProfileId};

/// Tolerance used when checking that weights sum to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Where a weight vector came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WeightSource {
    /// The engine-wide defaults.
    Default,
    /// A per-user override.
    Custom,
}

/// Version stamp of a weight vector.
///
/// Cached results are only reused when the weight version that produced them
/// matches the version that would be resolved now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightVersion {
    /// Origin of the weights.
    pub source: WeightSource,
    /// Monotonic revision within the source.
    pub revision: u64,
}

impl WeightVersion {
    /// Version of the default weights at `revision`.
    pub const fn default_at(revision: u64) -> Self {
        Self {
            source: WeightSource::Default,
            revision,
        }
    }

    /// Version of a custom override at `revision`.
    pub const fn custom_at(revision: u64) -> Self {
        Self {
            source: WeightSource::Custom,
            revision,
        }
    }
}

impl fmt::Display for WeightVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            WeightSource::Default => "default",
            WeightSource::Custom => "custom",
        };
        write!(f, "{source}@{}", self.revision)
    }
}

/// Errors raised when building a [`WeightVector`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightVectorError {
    /// No factors were supplied.
    #[error("weight vector has no factors")]
    Empty,
    /// A weight was NaN or infinite.
    #[error("weight for {factor} is not finite")]
    NonFinite {
        /// Offending factor.
        factor: Factor,
    },
    /// A weight was negative.
    #[error("weight for {factor} is negative ({weight})")]
    Negative {
        /// Offending factor.
        factor: Factor,
        /// Supplied weight.
        weight: f64,
    },
    /// All weights were zero.
    #[error("weights sum to zero")]
    ZeroTotal,
}

/// Non-negative weights over a factor vocabulary, summing to one.
///
/// # Examples
/// ```
/// use std::collections::BTreeMap;
/// use tandem_core::{Factor, WeightVector, WeightVersion};
///
/// let raw = BTreeMap::from([
///     (Factor::BudgetAlignment, 3.0),
///     (Factor::PlatformOverlap, 1.0),
/// ]);
/// let vector =
///     WeightVector::normalised(&raw, &Factor::BASE, WeightVersion::custom_at(1)).unwrap();
/// assert_eq!(vector.weight(Factor::BudgetAlignment), 0.75);
/// assert_eq!(vector.weight(Factor::NicheCompatibility), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightVector {
    weights: BTreeMap<Factor, f64>,
    version: WeightVersion,
}

impl Default for WeightVector {
    /// Equal weights over the augmented vocabulary at default revision 0.
    fn default() -> Self {
        let share = 1.0 / Factor::AUGMENTED.len() as f64;
        Self {
            weights: Factor::AUGMENTED.iter().map(|f| (*f, share)).collect(),
            version: WeightVersion::default_at(0),
        }
    }
}

impl WeightVector {
    /// Equal weights across `factors`.
    ///
    /// # Errors
    /// Returns [`WeightVectorError::Empty`] when `factors` is empty.
    pub fn uniform(factors: &[Factor], version: WeightVersion) -> Result<Self, WeightVectorError> {
        let raw: BTreeMap<Factor, f64> = factors.iter().map(|factor| (*factor, 1.0)).collect();
        Self::normalised(&raw, factors, version)
    }

    /// Normalise `raw` over `vocabulary`.
    ///
    /// Factors outside the vocabulary are ignored. Vocabulary factors absent
    /// from `raw` receive a weight of zero.
    ///
    /// # Errors
    /// Rejects empty vocabularies, non-finite or negative weights, and raw
    /// weights that sum to zero over the vocabulary.
    pub fn normalised(
        raw: &BTreeMap<Factor, f64>,
        vocabulary: &[Factor],
        version: WeightVersion,
    ) -> Result<Self, WeightVectorError> {
        if vocabulary.is_empty() {
            return Err(WeightVectorError::Empty);
        }
        let mut total = 0.0;
        for factor in vocabulary {
            let weight = raw.get(factor).copied().unwrap_or(0.0);
            if !weight.is_finite() {
                return Err(WeightVectorError::NonFinite { factor: *factor });
            }
            if weight < 0.0 {
                return Err(WeightVectorError::Negative {
                    factor: *factor,
                    weight,
                });
            }
            total += weight;
        }
        if total <= 0.0 {
            return Err(WeightVectorError::ZeroTotal);
        }
        let weights = vocabulary
            .iter()
            .map(|factor| (*factor, raw.get(factor).copied().unwrap_or(0.0) / total))
            .collect();
        Ok(Self { weights, version })
    }

    /// Weight of `factor`, zero when it is not part of the vector.
    pub fn weight(&self, factor: Factor) -> f64 {
        self.weights.get(&factor).copied().unwrap_or(0.0)
    }

    /// The factors the vector covers, in canonical order.
    pub fn factors(&self) -> impl Iterator<Item = Factor> + '_ {
        self.weights.keys().copied()
    }

    /// Iterate `(factor, weight)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Factor, f64)> + '_ {
        self.weights.iter().map(|(factor, weight)| (*factor, *weight))
    }

    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Version stamp of the vector.
    pub const fn version(&self) -> WeightVersion {
        self.version
    }

    /// Factors ordered by descending weight, ties broken by factor order.
    pub fn ranked(&self) -> Vec<(Factor, f64)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    /// Whether the weights are non-negative and sum to one within tolerance.
    pub fn is_normalised(&self) -> bool {
        self.weights.values().all(|w| w.is_finite() && *w >= 0.0)
            && (self.total() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }

    /// Raw weight map, for persistence.
    pub fn as_map(&self) -> &BTreeMap<Factor, f64> {
        &self.weights
    }
}

/// A per-user custom weighting as supplied by the preferences collaborator.
///
/// The raw weights need not sum to one; they are normalised at resolution
/// time and rejected if unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightOverride {
    /// User owning the override.
    pub user_id: ProfileId,
    /// Raw, unnormalised weights.
    pub weights: BTreeMap<Factor, f64>,
    /// Revision bumped whenever the user edits the override.
    pub revision: u64,
}

impl WeightOverride {
    /// Normalise the override over `vocabulary`.
    ///
    /// # Errors
    /// See [`WeightVector::normalised`].
    pub fn resolve(&self, vocabulary: &[Factor]) -> Result<WeightVector, WeightVectorError> {
        WeightVector::normalised(
            &self.weights,
            vocabulary,
            WeightVersion::custom_at(self.revision),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn raw(pairs: &[(Factor, f64)]) -> BTreeMap<Factor, f64> {
        pairs.iter().copied().collect()
    }

    #[rstest]
    fn uniform_weights_split_evenly() {
        let vector = WeightVector::uniform(&Factor::AUGMENTED, WeightVersion::default_at(0))
            .expect("uniform weights");
        assert!(vector.is_normalised());
        for factor in Factor::AUGMENTED {
            assert!((vector.weight(factor) - 1.0 / 7.0).abs() < 1e-12);
        }
    }

    #[rstest]
    fn ignores_factors_outside_vocabulary() {
        let vector = WeightVector::normalised(
            &raw(&[(Factor::BudgetAlignment, 1.0), (Factor::BrandFit, 9.0)]),
            &Factor::BASE,
            WeightVersion::custom_at(2),
        )
        .expect("normalise");
        assert_eq!(vector.weight(Factor::BudgetAlignment), 1.0);
        assert_eq!(vector.weight(Factor::BrandFit), 0.0);
        assert_eq!(vector.factors().count(), 5);
    }

    #[rstest]
    #[case(raw(&[(Factor::BudgetAlignment, -1.0)]), WeightVectorError::Negative { factor: Factor::BudgetAlignment, weight: -1.0 })]
    #[case(raw(&[(Factor::AudienceMatch, f64::INFINITY)]), WeightVectorError::NonFinite { factor: Factor::AudienceMatch })]
    #[case(raw(&[(Factor::BrandFit, 1.0)]), WeightVectorError::ZeroTotal)]
    fn rejects_unusable_weights(
        #[case] weights: BTreeMap<Factor, f64>,
        #[case] expected: WeightVectorError,
    ) {
        let err = WeightVector::normalised(&weights, &Factor::BASE, WeightVersion::custom_at(1))
            .expect_err("weights should be rejected");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn rejects_empty_vocabulary() {
        let err = WeightVector::uniform(&[], WeightVersion::default_at(0))
            .expect_err("empty vocabulary");
        assert_eq!(err, WeightVectorError::Empty);
    }

    #[rstest]
    fn ranks_by_descending_weight() {
        let vector = WeightVector::normalised(
            &raw(&[
                (Factor::NicheCompatibility, 1.0),
                (Factor::BudgetAlignment, 3.0),
                (Factor::PlatformOverlap, 1.0),
            ]),
            &Factor::BASE,
            WeightVersion::custom_at(1),
        )
        .expect("normalise");
        let ranked = vector.ranked();
        assert_eq!(ranked.first().map(|(f, _)| *f), Some(Factor::BudgetAlignment));
        assert_eq!(ranked.get(1).map(|(f, _)| *f), Some(Factor::NicheCompatibility));
    }

    #[rstest]
    fn versions_render_source_and_revision() {
        assert_eq!(WeightVersion::default_at(3).to_string(), "default@3");
        assert_eq!(WeightVersion::custom_at(7).to_string(), "custom@7");
    }
}
