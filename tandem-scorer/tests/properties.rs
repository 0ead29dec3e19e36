//! Property-based tests for scoring invariants.
//!
//! # Invariants tested
//!
//! - **Range:** every factor score lies in `0..=100`, as do the headline
//!   score, confidence and success probability.
//! - **Determinism:** scoring the same inputs twice yields the same result.
//! - **Normalisation:** any usable override resolves to weights summing to one.
//! - **Monotonic confidence:** more benchmark samples never lower confidence.
//! - **Bounded recalibration:** recalibrated defaults sum to one and no
//!   weight exceeds the configured cap.

use std::collections::BTreeMap;

use proptest::prelude::*;
use tandem_core::test_support::{fixed_time, outcome};
use tandem_core::{
    AudienceBand, Benchmark, Factor, FactorSet, PriceRange, Profile, ProfileId, Role,
    WeightOverride, WeightVector,
};
use tandem_scorer::{RecalibrationConfig, ScoringConfig, recalibrated_weights};
use tandem_scorer::aggregate::score;
use tandem_scorer::factors::ScoringInputs;

const NICHES: [&str; 4] = ["Fitness", "Health", "Gaming", "Beauty"];
const PLATFORMS: [&str; 4] = ["Instagram", "TikTok", "YouTube", "Twitch"];

fn price_range() -> impl Strategy<Value = Option<PriceRange>> {
    proptest::option::of((0.0_f64..20_000.0, 0.0_f64..20_000.0).prop_map(|(a, b)| PriceRange::new(a, b)))
}

fn platforms() -> impl Strategy<Value = Vec<&'static str>> {
    proptest::sample::subsequence(PLATFORMS.to_vec(), 0..=PLATFORMS.len())
}

fn profile(role: Role) -> impl Strategy<Value = Profile> {
    (
        proptest::option::of(proptest::sample::select(NICHES.to_vec())),
        price_range(),
        platforms(),
        proptest::option::of(0_u64..50_000_000),
        proptest::option::of((1_u64..10_000_000, 1_u64..10_000_000)),
        proptest::option::of(0.0_f64..40.0),
    )
        .prop_map(move |(niche, price, platforms, audience, band, engagement)| {
            let mut profile = Profile::new("generated", role, fixed_time()).with_platforms(platforms);
            profile.niche = niche.map(str::to_owned);
            match role {
                Role::Organization => profile.budget = price,
                Role::Creator => profile.rate = price,
            }
            profile.audience_size = audience;
            profile.desired_audience = band.map(|(a, b)| AudienceBand::new(a, b));
            profile.engagement_rate = engagement;
            profile
        })
}

fn raw_weights() -> impl Strategy<Value = BTreeMap<Factor, f64>> {
    proptest::collection::btree_map(
        proptest::sample::select(Factor::AUGMENTED.to_vec()),
        0.0_f64..10.0,
        1..=Factor::AUGMENTED.len(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: every score a result carries lies in its documented range.
    #[test]
    fn scores_stay_in_range(
        creator in profile(Role::Creator),
        organization in profile(Role::Organization),
    ) {
        let config = ScoringConfig::default();
        let benchmark = Benchmark::neutral();
        let inputs = ScoringInputs { benchmark: &benchmark, history: &[], config: &config };
        let result = score(&organization, &creator, &WeightVector::default(), inputs, fixed_time());

        prop_assert!(result.factors.is_in_range());
        prop_assert_eq!(result.factors.len(), Factor::AUGMENTED.len());
        prop_assert!(result.score <= 100);
        prop_assert!(result.confidence <= 100);
        prop_assert!(result.success_probability <= 100);
    }

    /// Property: scoring is a pure function of its inputs.
    #[test]
    fn scoring_is_deterministic(
        creator in profile(Role::Creator),
        organization in profile(Role::Organization),
    ) {
        let config = ScoringConfig::default();
        let benchmark = Benchmark::neutral();
        let inputs = ScoringInputs { benchmark: &benchmark, history: &[], config: &config };
        let first = score(&creator, &organization, &WeightVector::default(), inputs, fixed_time());
        let second = score(&creator, &organization, &WeightVector::default(), inputs, fixed_time());
        prop_assert_eq!(first, second);
    }

    /// Property: any override with a positive total resolves to weights
    /// summing to one.
    #[test]
    fn usable_overrides_normalise(raw in raw_weights()) {
        let total: f64 = raw.values().sum();
        prop_assume!(total > 0.0);
        let user_override = WeightOverride {
            user_id: ProfileId::new("user"),
            weights: raw,
            revision: 1,
        };
        let vector = user_override.resolve(&Factor::AUGMENTED);
        prop_assert!(vector.is_ok());
        if let Ok(vector) = vector {
            prop_assert!(vector.is_normalised());
        }
    }

    /// Property: benchmark confidence never decreases as samples grow.
    #[test]
    fn confidence_is_monotonic(
        smaller in 0_u32..1_000,
        extra in 0_u32..1_000,
        full in 0_u32..100,
    ) {
        let low = Benchmark::confidence_for(smaller, full);
        let high = Benchmark::confidence_for(smaller + extra, full);
        prop_assert!(low <= high);
        prop_assert!((0.0..=1.0).contains(&high));
    }

    /// Property: recalibrated default weights sum to one and respect the cap.
    #[test]
    #[expect(
        clippy::float_arithmetic,
        reason = "tolerances around the cap and the unit total"
    )]
    fn recalibration_respects_the_cap(
        scores in proptest::collection::vec(0.0_f64..=100.0, Factor::AUGMENTED.len()),
        boost in 1.0_f64..100.0,
        cap in 0.15_f64..=1.0,
    ) {
        let settings = RecalibrationConfig {
            min_successful_outcomes: 1,
            boost,
            cap,
            ..RecalibrationConfig::default()
        };
        let mut recorded = outcome("c", 5);
        recorded.factors_at_match = Factor::AUGMENTED
            .iter()
            .copied()
            .zip(scores)
            .collect::<FactorSet>();
        let weights = recalibrated_weights(&[recorded], &Factor::AUGMENTED, &settings);
        prop_assert!(weights.is_some());
        if let Some(weights) = weights {
            prop_assert!(weights.values().all(|w| *w <= cap + 1e-9));
            prop_assert!((weights.values().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }
}
