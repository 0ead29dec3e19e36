//! Fixture builders shared by unit and behaviour tests.
//!
//! Every builder uses [`fixed_time`] so results are reproducible.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::{
    AudienceBand, BenchmarkVersion, CacheStamp, CollaborationOutcome, CompletionStatus, Factor,
    FactorSet, MatchHistoryEntry, MatchResult, MatchTier, PriceRange, Profile, ProfileId, Role,
    Segment, Tier, WeightVector, WeightVersion,
};

/// Reference instant used by every fixture: 2024-01-01T00:00:00Z.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Fitness micro-tier creator on Instagram and TikTok.
pub fn creator(id: &str) -> Profile {
    Profile::new(id, Role::Creator, fixed_time())
        .with_niche("Fitness")
        .with_audience_size(25_000)
        .with_engagement_rate(4.0)
        .with_platforms(["Instagram", "TikTok"])
}

/// Fitness brand with a $1000-$5000 budget on Instagram and YouTube.
pub fn organization(id: &str) -> Profile {
    Profile::new(id, Role::Organization, fixed_time())
        .with_niche("Fitness")
        .with_budget(PriceRange::new(1_000.0, 5_000.0))
        .with_platforms(["Instagram", "YouTube"])
        .with_desired_audience(AudienceBand::new(10_000, 100_000))
}

/// The segment of [`creator`] profiles.
pub fn fitness_micro() -> Segment {
    Segment::new("fitness", Tier::Micro)
}

/// Completed outcome in the [`fitness_micro`] segment.
pub fn outcome(connection_id: &str, rating: u8) -> CollaborationOutcome {
    CollaborationOutcome {
        connection_id: connection_id.to_owned(),
        segment: Some(fitness_micro()),
        success_rating: rating,
        completion_status: CompletionStatus::Completed,
        roi_achieved: None,
        would_collaborate_again: true,
        factors_at_match: FactorSet::default(),
        creator_rate: None,
        creator_engagement: None,
        recorded_by: ProfileId::new("org-1"),
        recorded_at: fixed_time(),
    }
}

/// Result with neutral factors and the default weights.
pub fn match_result(subject: &str, candidate: &str, score: u8) -> MatchResult {
    MatchResult {
        subject_id: ProfileId::new(subject),
        candidate_id: ProfileId::new(candidate),
        score,
        confidence: 50,
        tier: MatchTier::from_score(score),
        success_probability: 50,
        factors: FactorSet::neutral(&Factor::AUGMENTED),
        weights_used: WeightVector::default(),
        reasoning: Vec::new(),
        weaknesses: Vec::new(),
        computed_at: fixed_time(),
    }
}

/// History entry computed `minutes` after [`fixed_time`].
pub fn history_entry(subject: &str, candidate: &str, score: u8, minutes: i64) -> MatchHistoryEntry {
    let mut result = match_result(subject, candidate, score);
    result.computed_at = fixed_time() + Duration::minutes(minutes);
    MatchHistoryEntry {
        stamp: CacheStamp {
            weights: WeightVersion::default_at(0),
            benchmarks: BenchmarkVersion::default(),
            history_generation: 0,
            inputs: None,
        },
        result,
    }
}
