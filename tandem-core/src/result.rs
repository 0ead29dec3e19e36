//! Match results, cache entries and comparison structures.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BenchmarkVersion, Factor, FactorSet, ProfileId, WeightVector, WeightVersion};

/// Confidence below which presentation layers should flag a match.
pub const LOW_CONFIDENCE_THRESHOLD: u8 = 40;

/// Coarse quality band for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchTier {
    /// Below 60.
    Fair,
    /// 60 to 74.
    Good,
    /// 75 to 89.
    Excellent,
    /// 90 and above.
    Perfect,
}

impl MatchTier {
    /// Band for a rounded score.
    ///
    /// # Examples
    /// ```
    /// use tandem_core::MatchTier;
    ///
    /// assert_eq!(MatchTier::from_score(90), MatchTier::Perfect);
    /// assert_eq!(MatchTier::from_score(74), MatchTier::Good);
    /// assert_eq!(MatchTier::from_score(12), MatchTier::Fair);
    /// ```
    pub const fn from_score(score: u8) -> Self {
        match score {
            90.. => Self::Perfect,
            75..=89 => Self::Excellent,
            60..=74 => Self::Good,
            _ => Self::Fair,
        }
    }
}

/// Immutable outcome of scoring one subject against one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Profile the request was made for.
    pub subject_id: ProfileId,
    /// Profile being evaluated.
    pub candidate_id: ProfileId,
    /// Weighted score, rounded, in `0..=100`.
    pub score: u8,
    /// How much data supports the score, in `0..=100`.
    pub confidence: u8,
    /// Quality band of `score`.
    pub tier: MatchTier,
    /// Estimated chance the collaboration succeeds, in percent.
    pub success_probability: u8,
    /// Per-factor scores.
    pub factors: FactorSet,
    /// Weights the score was aggregated with.
    pub weights_used: WeightVector,
    /// Strengths, strongest contribution first.
    pub reasoning: Vec<String>,
    /// Weaknesses, weakest factor first.
    #[serde(default)]
    pub weaknesses: Vec<String>,
    /// When the result was computed.
    pub computed_at: DateTime<Utc>,
}

impl MatchResult {
    /// Ranking order: higher score first, then higher confidence, then
    /// higher `historicalSuccess`, then candidate id for a stable order.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| other.confidence.cmp(&self.confidence))
            .then_with(|| {
                other
                    .factors
                    .score_or_neutral(Factor::HistoricalSuccess)
                    .total_cmp(&self.factors.score_or_neutral(Factor::HistoricalSuccess))
            })
            .then_with(|| self.candidate_id.cmp(&other.candidate_id))
    }

    /// Whether the score should be displayed as low-confidence.
    pub const fn is_low_confidence(&self) -> bool {
        self.confidence < LOW_CONFIDENCE_THRESHOLD
    }
}

/// Versions a cached result was computed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStamp {
    /// Weight vector version.
    pub weights: WeightVersion,
    /// Benchmark snapshot version.
    pub benchmarks: BenchmarkVersion,
    /// Outcome generation of the candidate's segment.
    pub history_generation: u64,
    /// Digest of the weights, benchmark, outcome history and configuration
    /// the result was computed from.
    ///
    /// Versions restart in every process while history stores may outlive
    /// it, so a cached entry is reused only when its digest is present and
    /// equal as well.
    #[serde(default)]
    pub inputs: Option<InputDigest>,
}

/// BLAKE3 digest of a result's scoring inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputDigest(pub [u8; 32]);

/// Persisted match result together with the versions that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchHistoryEntry {
    /// Versions in force at computation time.
    pub stamp: CacheStamp,
    /// The computed result.
    pub result: MatchResult,
}

/// Filter applied to history queries.
///
/// # Examples
/// ```
/// use tandem_core::HistoryFilter;
///
/// let filter = HistoryFilter::default().with_min_score(70).with_limit(5);
/// assert_eq!(filter.limit, Some(5));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFilter {
    /// Inclusive lower score bound.
    pub min_score: Option<u8>,
    /// Inclusive upper score bound.
    pub max_score: Option<u8>,
    /// Only results computed at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only results computed at or before this instant.
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of entries returned.
    pub limit: Option<usize>,
}

impl HistoryFilter {
    /// Require a minimum score.
    #[must_use]
    pub const fn with_min_score(mut self, score: u8) -> Self {
        self.min_score = Some(score);
        self
    }

    /// Require a maximum score.
    #[must_use]
    pub const fn with_max_score(mut self, score: u8) -> Self {
        self.max_score = Some(score);
        self
    }

    /// Restrict to results computed at or after `since`.
    #[must_use]
    pub const fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Restrict to results computed at or before `until`.
    #[must_use]
    pub const fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Cap the number of entries.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `result` passes the score and time bounds.
    pub fn matches(&self, result: &MatchResult) -> bool {
        self.min_score.is_none_or(|min| result.score >= min)
            && self.max_score.is_none_or(|max| result.score <= max)
            && self.since.is_none_or(|since| result.computed_at >= since)
            && self.until.is_none_or(|until| result.computed_at <= until)
    }

    /// Apply the filter to entries already ordered newest first.
    pub fn apply<I>(&self, entries: I) -> Vec<MatchHistoryEntry>
    where
        I: IntoIterator<Item = MatchHistoryEntry>,
    {
        let limit = self.limit.unwrap_or(usize::MAX);
        entries
            .into_iter()
            .filter(|entry| self.matches(&entry.result))
            .take(limit)
            .collect()
    }
}

/// One entry of a batch comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedMatch {
    /// One-based position in the ranking.
    pub rank: usize,
    /// The candidate's result.
    pub result: MatchResult,
    /// Each factor's difference from the batch average.
    pub factor_deltas: BTreeMap<Factor, f64>,
}

/// Ranked comparison of several candidates for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    /// Subject the candidates were scored for.
    pub subject_id: ProfileId,
    /// Mean score per factor across the batch.
    pub averages: BTreeMap<Factor, f64>,
    /// Candidates, best first.
    pub ranked: Vec<RankedMatch>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixed_time, match_result};
    use rstest::rstest;

    #[rstest]
    fn ties_break_on_confidence_then_history() {
        let mut low_conf = match_result("s", "a", 80);
        low_conf.confidence = 40;
        let mut high_conf = match_result("s", "b", 80);
        high_conf.confidence = 70;
        assert_eq!(high_conf.rank_cmp(&low_conf), Ordering::Less);

        let mut weak_history = match_result("s", "c", 80);
        weak_history.factors.insert(Factor::HistoricalSuccess, 30.0);
        let mut strong_history = match_result("s", "d", 80);
        strong_history.factors.insert(Factor::HistoricalSuccess, 90.0);
        assert_eq!(strong_history.rank_cmp(&weak_history), Ordering::Less);
    }

    #[rstest]
    fn higher_score_always_ranks_first() {
        let mut strong = match_result("s", "z", 81);
        strong.confidence = 0;
        let weak = match_result("s", "a", 80);
        assert_eq!(strong.rank_cmp(&weak), Ordering::Less);
    }

    #[rstest]
    fn filter_bounds_are_inclusive() {
        let result = match_result("s", "a", 70);
        let filter = HistoryFilter::default()
            .with_min_score(70)
            .with_max_score(70)
            .with_since(fixed_time())
            .with_until(fixed_time());
        assert!(filter.matches(&result));
        assert!(!HistoryFilter::default().with_min_score(71).matches(&result));
    }

    #[rstest]
    fn low_confidence_is_flagged() {
        let mut result = match_result("s", "a", 70);
        result.confidence = LOW_CONFIDENCE_THRESHOLD - 1;
        assert!(result.is_low_confidence());
    }
}
