//! System default weights and per-request weight resolution.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tandem_core::{
    Factor, ProfileId, WeightOverrides, WeightVector, WeightVectorError, WeightVersion,
};

use crate::ConfigError;

/// Versioned registry of the system default weight vector.
///
/// Revision 0 is the uniform vector over the configured vocabulary. Each
/// publication advances the revision, which changes the stamp of every
/// result scored with default weights.
#[derive(Debug)]
pub struct DefaultWeights {
    current: RwLock<WeightVector>,
    vocabulary: &'static [Factor],
}

impl DefaultWeights {
    /// Uniform defaults over `vocabulary`.
    ///
    /// # Errors
    /// Returns [`ConfigError::Weights`] when the vocabulary is empty.
    pub fn new(vocabulary: &'static [Factor]) -> Result<Self, ConfigError> {
        let uniform = WeightVector::uniform(vocabulary, WeightVersion::default_at(0))
            .map_err(|source| ConfigError::Weights { source })?;
        Ok(Self {
            current: RwLock::new(uniform),
            vocabulary,
        })
    }

    /// The vector currently in force.
    #[must_use]
    pub fn current(&self) -> WeightVector {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Vocabulary the defaults cover.
    #[must_use]
    pub const fn vocabulary(&self) -> &'static [Factor] {
        self.vocabulary
    }

    /// Normalise `raw` and publish it as the next revision.
    ///
    /// # Errors
    /// Returns the normalisation error and leaves the current vector in
    /// place when `raw` is unusable.
    pub fn publish(&self, raw: &BTreeMap<Factor, f64>) -> Result<WeightVersion, WeightVectorError> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let revision = current.version().revision.saturating_add(1);
        let next =
            WeightVector::normalised(raw, self.vocabulary, WeightVersion::default_at(revision))?;
        let version = next.version();
        *current = next;
        drop(current);
        log::info!("published default weights {version}");
        Ok(version)
    }

    /// Factors ordered by current default weight, heaviest first.
    #[must_use]
    pub fn ranked(&self) -> Vec<(Factor, f64)> {
        self.current().ranked()
    }

    /// Return to uniform weights at the next revision.
    pub fn reset(&self) {
        let raw: BTreeMap<Factor, f64> = self.vocabulary.iter().map(|f| (*f, 1.0)).collect();
        if let Err(err) = self.publish(&raw) {
            log::warn!("failed to reset default weights: {err}");
        }
    }
}

/// Weights chosen for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWeights {
    /// The effective, normalised vector.
    pub vector: WeightVector,
    /// Whether an override existed but was rejected.
    pub fallback: bool,
}

/// Picks a user's override when it is usable, else the system defaults.
#[derive(Debug)]
pub struct WeightResolver<W> {
    overrides: W,
    fallbacks: AtomicU64,
}

impl<W: WeightOverrides> WeightResolver<W> {
    /// Wrap an override source.
    #[must_use]
    pub const fn new(overrides: W) -> Self {
        Self {
            overrides,
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Effective weights for `user`.
    ///
    /// Never fails: an invalid override is logged, counted and replaced by
    /// the defaults.
    pub fn resolve(&self, user: &ProfileId, defaults: &DefaultWeights) -> ResolvedWeights {
        let Some(custom) = self.overrides.weight_override(user) else {
            return ResolvedWeights {
                vector: defaults.current(),
                fallback: false,
            };
        };
        match custom.resolve(defaults.vocabulary()) {
            Ok(vector) => ResolvedWeights {
                vector,
                fallback: false,
            },
            Err(err) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                log::warn!("ignoring weight override for {user}: {err}");
                ResolvedWeights {
                    vector: defaults.current(),
                    fallback: true,
                }
            }
        }
    }

    /// Number of rejected overrides since construction.
    #[must_use]
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// The wrapped override source.
    #[must_use]
    pub const fn overrides(&self) -> &W {
        &self.overrides
    }
}

#[cfg(test)]
#[expect(
    clippy::float_arithmetic,
    reason = "assertions compare normalised weights"
)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tandem_core::{MemoryWeightOverrides, WeightSource};

    #[fixture]
    fn defaults() -> DefaultWeights {
        DefaultWeights::new(&Factor::AUGMENTED).expect("defaults")
    }

    #[rstest]
    fn missing_override_uses_defaults(defaults: DefaultWeights) {
        let resolver = WeightResolver::new(MemoryWeightOverrides::default());
        let resolved = resolver.resolve(&ProfileId::new("u"), &defaults);
        assert_eq!(resolved.vector.version(), WeightVersion::default_at(0));
        assert!(!resolved.fallback);
        assert_eq!(resolver.fallback_count(), 0);
    }

    #[rstest]
    fn partial_override_is_renormalised(defaults: DefaultWeights) {
        let overrides = MemoryWeightOverrides::default();
        overrides.set(
            ProfileId::new("u"),
            BTreeMap::from([(Factor::BudgetAlignment, 3.0), (Factor::NicheCompatibility, 1.0)]),
        );
        let resolver = WeightResolver::new(overrides);
        let resolved = resolver.resolve(&ProfileId::new("u"), &defaults);
        assert_eq!(resolved.vector.version().source, WeightSource::Custom);
        assert!((resolved.vector.weight(Factor::BudgetAlignment) - 0.75).abs() < 1e-12);
        assert!(resolved.vector.is_normalised());
    }

    #[rstest]
    #[case(BTreeMap::from([(Factor::BudgetAlignment, 0.0)]))]
    #[case(BTreeMap::from([(Factor::BudgetAlignment, -1.0), (Factor::BrandFit, 2.0)]))]
    fn invalid_override_falls_back(defaults: DefaultWeights, #[case] raw: BTreeMap<Factor, f64>) {
        let overrides = MemoryWeightOverrides::default();
        overrides.set(ProfileId::new("u"), raw);
        let resolver = WeightResolver::new(overrides);
        let resolved = resolver.resolve(&ProfileId::new("u"), &defaults);
        assert!(resolved.fallback);
        assert_eq!(resolved.vector, defaults.current());
        assert_eq!(resolver.fallback_count(), 1);
    }

    #[rstest]
    fn publishing_advances_revision(defaults: DefaultWeights) {
        let raw = BTreeMap::from([(Factor::BudgetAlignment, 2.0), (Factor::BrandFit, 2.0)]);
        let version = defaults.publish(&raw).expect("publish");
        assert_eq!(version, WeightVersion::default_at(1));
        assert_eq!(defaults.ranked().first().map(|(f, _)| *f), Some(Factor::BudgetAlignment));

        defaults.reset();
        assert_eq!(defaults.current().version(), WeightVersion::default_at(2));
        assert!((defaults.current().weight(Factor::BrandFit) - 1.0 / 7.0).abs() < 1e-12);
    }

    #[rstest]
    fn rejected_publication_keeps_current(defaults: DefaultWeights) {
        let before = defaults.current();
        assert!(defaults.publish(&BTreeMap::new()).is_err());
        assert_eq!(defaults.current(), before);
    }
}
