//! Match history cache, single-flight recomputation and batch comparison.
//!
//! A cached result is reused only while its [`CacheStamp`] equals the stamp
//! a fresh computation would carry and neither profile changed after the
//! result was computed. Anything that advances a version (benchmark
//! recalculation, default weight publication, an override edit or a new
//! outcome in the creator's segment) therefore invalidates lazily: stale
//! entries stay in the append-only history and are superseded on next read.
//!
//! Versions are counters local to one [`ScoringContext`], so the stamp also
//! carries a digest of the inputs themselves. A history store shared by
//! several processes only serves a result to a process that would score the
//! pair from identical weights, benchmark, outcomes and configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tandem_core::{
    Benchmark, CacheStamp, Comparison, Factor, HistoryFilter, InputDigest, MatchHistoryEntry,
    MatchHistoryStore, MatchResult, Profile, ProfileId, ProfileSource, RankedMatch,
    WeightOverrides, WeightVector,
};

use crate::aggregate;
use crate::factors::{Pairing, ScoringInputs};
use crate::flight::{FlightOutcome, SingleFlight};
use crate::ledger::LedgerEntry;
use crate::weights::WeightResolver;
use crate::{MatchError, ScoringConfig, ScoringContext};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PairKey {
    subject: ProfileId,
    candidate: ProfileId,
    stamp: CacheStamp,
}

/// Everything a computation for one pair depends on, captured once.
struct Request {
    subject: Profile,
    candidate: Profile,
    weights: WeightVector,
    benchmark: Benchmark,
    history: Vec<LedgerEntry>,
    stamp: CacheStamp,
}

impl Request {
    fn is_fresh(&self, entry: &MatchHistoryEntry) -> bool {
        self.stamp.inputs.is_some()
            && entry.stamp == self.stamp
            && self.subject.updated_at <= entry.result.computed_at
            && self.candidate.updated_at <= entry.result.computed_at
    }

    fn key(&self) -> PairKey {
        PairKey {
            subject: self.subject.id.clone(),
            candidate: self.candidate.id.clone(),
            stamp: self.stamp,
        }
    }
}

/// Everything a score depends on besides the two profiles.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DigestInputs<'a> {
    weights: &'a BTreeMap<Factor, f64>,
    benchmark: Benchmark,
    history: Vec<(DateTime<Utc>, u8, f64)>,
    config: &'a ScoringConfig,
}

impl DigestInputs<'_> {
    fn digest(&self) -> Option<InputDigest> {
        let mut hasher = blake3::Hasher::new();
        serde_json::to_writer(&mut hasher, self).map_or_else(
            |err| {
                log::warn!("cannot fingerprint scoring inputs; result will not be reused: {err}");
                None
            },
            |()| Some(InputDigest(*hasher.finalize().as_bytes())),
        )
    }
}

/// Scores pairs through the match history cache.
pub struct MatchEngine<P, W, H> {
    profiles: P,
    resolver: WeightResolver<W>,
    history: H,
    context: Arc<ScoringContext>,
    flights: SingleFlight<PairKey, MatchResult>,
    computations: AtomicU64,
}

impl<P, W, H> MatchEngine<P, W, H>
where
    P: ProfileSource,
    W: WeightOverrides,
    H: MatchHistoryStore,
{
    /// Assemble an engine over its collaborators and shared state.
    #[must_use]
    pub fn new(profiles: P, overrides: W, history: H, context: Arc<ScoringContext>) -> Self {
        Self {
            profiles,
            resolver: WeightResolver::new(overrides),
            history,
            context,
            flights: SingleFlight::new(),
            computations: AtomicU64::new(0),
        }
    }

    /// Cached or freshly computed result for the pair.
    ///
    /// # Errors
    /// Returns [`MatchError::UnknownProfile`] when either id does not
    /// resolve. Every other problem is recovered.
    pub fn get_or_compute(
        &self,
        subject: &ProfileId,
        candidate: &ProfileId,
    ) -> Result<MatchResult, MatchError> {
        self.get_or_compute_at(subject, candidate, Utc::now())
    }

    /// [`MatchEngine::get_or_compute`] stamping new results with `now`.
    ///
    /// # Errors
    /// See [`MatchEngine::get_or_compute`].
    pub fn get_or_compute_at(
        &self,
        subject: &ProfileId,
        candidate: &ProfileId,
        now: DateTime<Utc>,
    ) -> Result<MatchResult, MatchError> {
        let request = self.prepare(subject, candidate)?;
        if let Some(hit) = self.cached(&request) {
            return Ok(hit);
        }
        let timeout = self.context.config().single_flight_timeout();
        let outcome = self.flights.run(request.key(), timeout, || {
            self.cached(&request)
                .unwrap_or_else(|| self.compute(&request, now))
        });
        if let FlightOutcome::Joined(_) = &outcome {
            log::debug!("reused in-flight result for {subject} -> {candidate}");
        }
        Ok(outcome.into_value())
    }

    /// Score `candidates` for `subject` and rank them.
    ///
    /// Duplicate candidate ids are scored once. Each ranked entry carries
    /// its factor differences from the batch average.
    ///
    /// # Errors
    /// Fails on the first id that does not resolve to a profile.
    pub fn compare_batch(
        &self,
        subject: &ProfileId,
        candidates: &[ProfileId],
    ) -> Result<Comparison, MatchError> {
        self.compare_batch_at(subject, candidates, Utc::now())
    }

    /// [`MatchEngine::compare_batch`] stamping new results with `now`.
    ///
    /// # Errors
    /// See [`MatchEngine::compare_batch`].
    pub fn compare_batch_at(
        &self,
        subject: &ProfileId,
        candidates: &[ProfileId],
        now: DateTime<Utc>,
    ) -> Result<Comparison, MatchError> {
        let mut seen = BTreeSet::new();
        let mut results = candidates
            .iter()
            .filter(|id| seen.insert(*id))
            .map(|candidate| self.get_or_compute_at(subject, candidate, now))
            .collect::<Result<Vec<_>, _>>()?;
        results.sort_by(MatchResult::rank_cmp);
        Ok(rank(subject, results, self.context.config().vocabulary()))
    }

    /// Past results for `subject`, newest first.
    ///
    /// # Errors
    /// Returns [`MatchError::History`] when the store cannot be read.
    pub fn history(
        &self,
        subject: &ProfileId,
        filter: &HistoryFilter,
    ) -> Result<Vec<MatchHistoryEntry>, MatchError> {
        self.history
            .history(subject, filter)
            .map_err(|source| MatchError::History { source })
    }

    /// Default weights ranked heaviest first.
    #[must_use]
    pub fn feature_importance(&self) -> Vec<(Factor, f64)> {
        self.context.defaults().ranked()
    }

    /// Number of rejected weight overrides.
    #[must_use]
    pub fn fallback_count(&self) -> u64 {
        self.resolver.fallback_count()
    }

    /// Number of full computations performed.
    #[must_use]
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    /// Shared scoring state.
    #[must_use]
    pub const fn context(&self) -> &Arc<ScoringContext> {
        &self.context
    }

    fn load(&self, id: &ProfileId, role: &'static str) -> Result<Profile, MatchError> {
        self.profiles
            .profile(id)
            .ok_or_else(|| MatchError::UnknownProfile {
                role,
                id: id.clone(),
            })
    }

    fn prepare(
        &self,
        subject_id: &ProfileId,
        candidate_id: &ProfileId,
    ) -> Result<Request, MatchError> {
        let subject = self.load(subject_id, "subject")?;
        let candidate = self.load(candidate_id, "candidate")?;
        let weights = self
            .resolver
            .resolve(&subject.id, self.context.defaults())
            .vector;
        let snapshot = self.context.benchmarks().snapshot();
        let segment = Pairing::orient(&subject, &candidate).creator.segment();
        let ledger = self.context.ledger();
        // Generation is read before the entries, so the stamp never claims
        // more history than the result saw.
        let history_generation = ledger.generation(segment.as_ref());
        let history = ledger.recent(segment.as_ref());
        let benchmark = snapshot.benchmark_or_neutral(segment.as_ref());
        let inputs = DigestInputs {
            weights: weights.as_map(),
            benchmark: Benchmark {
                recalculated_at: None,
                ..benchmark.clone()
            },
            history: history
                .iter()
                .map(|e| (e.recorded_at, e.rating, e.brand_signal))
                .collect(),
            config: self.context.config(),
        }
        .digest();
        let stamp = CacheStamp {
            weights: weights.version(),
            benchmarks: snapshot.version(),
            history_generation,
            inputs,
        };
        Ok(Request {
            subject,
            candidate,
            weights,
            benchmark,
            history,
            stamp,
        })
    }

    fn cached(&self, request: &Request) -> Option<MatchResult> {
        let latest = match self.history.latest(&request.subject.id, &request.candidate.id) {
            Ok(latest) => latest,
            Err(err) => {
                log::warn!("match history read failed; scoring uncached: {err}");
                return None;
            }
        };
        match latest {
            Some(entry) if request.is_fresh(&entry) => {
                log::debug!(
                    "cache hit for {} -> {}",
                    request.subject.id,
                    request.candidate.id
                );
                Some(entry.result)
            }
            Some(entry) => {
                log::debug!(
                    "stale cache entry for {} -> {} (stamp {:?}, now {:?})",
                    request.subject.id,
                    request.candidate.id,
                    entry.stamp,
                    request.stamp
                );
                None
            }
            None => None,
        }
    }

    fn compute(&self, request: &Request, now: DateTime<Utc>) -> MatchResult {
        let inputs = ScoringInputs {
            benchmark: &request.benchmark,
            history: &request.history,
            config: self.context.config(),
        };
        let result = aggregate::score(
            &request.subject,
            &request.candidate,
            &request.weights,
            inputs,
            now,
        );
        self.computations.fetch_add(1, Ordering::Relaxed);
        let entry = MatchHistoryEntry {
            stamp: request.stamp,
            result,
        };
        if let Err(err) = self.history.append(&entry) {
            log::warn!("failed to persist match history entry: {err}");
        }
        entry.result
    }
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "batch averages and deltas are arithmetic over factor scores"
)]
fn rank(subject: &ProfileId, results: Vec<MatchResult>, vocabulary: &[Factor]) -> Comparison {
    let mut averages = BTreeMap::new();
    if !results.is_empty() {
        let count = results.len() as f64;
        for factor in vocabulary {
            let total: f64 = results
                .iter()
                .map(|result| result.factors.score_or_neutral(*factor))
                .sum();
            averages.insert(*factor, total / count);
        }
    }
    let ranked = results
        .into_iter()
        .zip(1..)
        .map(|(result, rank)| {
            let factor_deltas = averages
                .iter()
                .map(|(factor, average)| {
                    (*factor, result.factors.score_or_neutral(*factor) - average)
                })
                .collect();
            RankedMatch {
                rank,
                result,
                factor_deltas,
            }
        })
        .collect();
    Comparison {
        subject_id: subject.clone(),
        averages,
        ranked,
    }
}

#[cfg(test)]
#[expect(
    clippy::float_arithmetic,
    reason = "assertions compare factor deltas"
)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::{fixture, rstest};
    use tandem_core::test_support::{creator, fixed_time, organization, outcome};
    use tandem_core::{
        MemoryHistoryStore, MemoryProfiles, MemoryWeightOverrides, PriceRange, StoreError,
    };

    type Engine = MatchEngine<Arc<MemoryProfiles>, Arc<MemoryWeightOverrides>, Arc<MemoryHistoryStore>>;

    struct Harness {
        profiles: Arc<MemoryProfiles>,
        overrides: Arc<MemoryWeightOverrides>,
        history: Arc<MemoryHistoryStore>,
        engine: Engine,
    }

    #[fixture]
    fn harness() -> Harness {
        let profiles = Arc::new(MemoryProfiles::with_profiles([
            organization("brand"),
            creator("alice").with_rate(PriceRange::point(3_000.0)),
            creator("bob").with_rate(PriceRange::point(9_000.0)),
        ]));
        let overrides = Arc::new(MemoryWeightOverrides::default());
        let history = Arc::new(MemoryHistoryStore::default());
        let context =
            Arc::new(ScoringContext::new(ScoringConfig::default()).expect("context"));
        let engine = MatchEngine::new(
            Arc::clone(&profiles),
            Arc::clone(&overrides),
            Arc::clone(&history),
            context,
        );
        Harness {
            profiles,
            overrides,
            history,
            engine,
        }
    }

    fn id(raw: &str) -> ProfileId {
        ProfileId::new(raw)
    }

    #[rstest]
    fn repeated_request_is_served_from_history(harness: Harness) {
        let first = harness
            .engine
            .get_or_compute_at(&id("brand"), &id("alice"), fixed_time())
            .expect("first");
        let later = fixed_time() + Duration::minutes(5);
        let second = harness
            .engine
            .get_or_compute_at(&id("brand"), &id("alice"), later)
            .expect("second");
        assert_eq!(first, second);
        assert_eq!(harness.engine.computations(), 1);
        assert_eq!(harness.history.len(), 1);
    }

    #[rstest]
    fn profile_update_supersedes_entry(harness: Harness) {
        harness
            .engine
            .get_or_compute_at(&id("brand"), &id("alice"), fixed_time())
            .expect("first");
        let updated = fixed_time() + Duration::minutes(1);
        let mut alice = creator("alice").with_platforms(["YouTube"]);
        alice.updated_at = updated;
        harness.profiles.upsert(alice);

        let second = harness
            .engine
            .get_or_compute_at(&id("brand"), &id("alice"), updated + Duration::minutes(1))
            .expect("second");
        assert_eq!(second.computed_at, updated + Duration::minutes(1));
        assert_eq!(harness.engine.computations(), 2);
        assert_eq!(harness.history.len(), 2);
    }

    #[rstest]
    fn override_edit_changes_the_stamp(harness: Harness) {
        harness
            .engine
            .get_or_compute_at(&id("brand"), &id("alice"), fixed_time())
            .expect("first");
        harness.overrides.set(
            id("brand"),
            BTreeMap::from([(Factor::BudgetAlignment, 1.0)]),
        );
        let second = harness
            .engine
            .get_or_compute_at(&id("brand"), &id("alice"), fixed_time() + Duration::hours(1))
            .expect("second");
        assert_eq!(second.score, 100);
        assert_eq!(harness.engine.computations(), 2);
    }

    #[rstest]
    fn override_set_again_after_removal_is_rescored(harness: Harness) {
        harness
            .overrides
            .set(id("brand"), BTreeMap::from([(Factor::NicheCompatibility, 1.0)]));
        let first = harness
            .engine
            .get_or_compute_at(&id("brand"), &id("alice"), fixed_time())
            .expect("first");
        assert_eq!(first.weights_used.weight(Factor::NicheCompatibility), 1.0);

        harness.overrides.remove(&id("brand"));
        harness
            .overrides
            .set(id("brand"), BTreeMap::from([(Factor::BudgetAlignment, 1.0)]));
        let second = harness
            .engine
            .get_or_compute_at(&id("brand"), &id("alice"), fixed_time() + Duration::hours(1))
            .expect("second");
        assert_eq!(second.weights_used.weight(Factor::BudgetAlignment), 1.0);
        assert_eq!(harness.engine.computations(), 2);
    }

    #[rstest]
    fn shared_history_is_not_served_to_a_context_with_other_outcomes() {
        let profiles = Arc::new(MemoryProfiles::with_profiles([
            organization("brand"),
            creator("alice"),
        ]));
        let history = Arc::new(MemoryHistoryStore::default());
        let engine_with = |rating: u8| {
            let context =
                Arc::new(ScoringContext::new(ScoringConfig::default()).expect("context"));
            for step in 0..5 {
                assert!(context
                    .ledger()
                    .record(&outcome(&format!("c-{step}"), rating))
                    .is_some());
            }
            MatchEngine::new(
                Arc::clone(&profiles),
                MemoryWeightOverrides::default(),
                Arc::clone(&history),
                context,
            )
        };

        let praised = engine_with(5)
            .get_or_compute_at(&id("brand"), &id("alice"), fixed_time())
            .expect("first process");
        let later = fixed_time() + Duration::minutes(10);
        let panned = engine_with(1)
            .get_or_compute_at(&id("brand"), &id("alice"), later)
            .expect("second process");

        assert_eq!(panned.computed_at, later);
        assert!(
            panned.factors.score_or_neutral(Factor::HistoricalSuccess)
                < praised.factors.score_or_neutral(Factor::HistoricalSuccess)
        );
        assert_eq!(history.len(), 2);
    }

    #[rstest]
    fn identical_inputs_reuse_a_shared_history() {
        let profiles = Arc::new(MemoryProfiles::with_profiles([
            organization("brand"),
            creator("alice"),
        ]));
        let history = Arc::new(MemoryHistoryStore::default());
        let engine = || {
            MatchEngine::new(
                Arc::clone(&profiles),
                MemoryWeightOverrides::default(),
                Arc::clone(&history),
                Arc::new(ScoringContext::new(ScoringConfig::default()).expect("context")),
            )
        };
        let first = engine()
            .get_or_compute_at(&id("brand"), &id("alice"), fixed_time())
            .expect("first process");
        let second = engine()
            .get_or_compute_at(&id("brand"), &id("alice"), fixed_time() + Duration::hours(1))
            .expect("second process");
        assert_eq!(first, second);
        assert_eq!(history.len(), 1);
    }

    #[rstest]
    fn unknown_profiles_are_rejected(harness: Harness) {
        let err = harness
            .engine
            .get_or_compute(&id("brand"), &id("ghost"))
            .expect_err("unknown candidate");
        assert!(matches!(
            err,
            MatchError::UnknownProfile {
                role: "candidate",
                ..
            }
        ));
    }

    #[rstest]
    fn batch_is_ranked_with_deltas(harness: Harness) {
        let comparison = harness
            .engine
            .compare_batch_at(
                &id("brand"),
                &[id("bob"), id("alice"), id("bob")],
                fixed_time(),
            )
            .expect("comparison");
        let order: Vec<&str> = comparison
            .ranked
            .iter()
            .map(|m| m.result.candidate_id.as_str())
            .collect();
        assert_eq!(order, ["alice", "bob"]);
        assert_eq!(comparison.ranked.first().map(|m| m.rank), Some(1));
        let budget_deltas: f64 = comparison
            .ranked
            .iter()
            .filter_map(|m| m.factor_deltas.get(&Factor::BudgetAlignment))
            .sum();
        assert!(budget_deltas.abs() < 1e-9);
    }

    struct BrokenHistory;

    impl MatchHistoryStore for BrokenHistory {
        fn latest(
            &self,
            _: &ProfileId,
            _: &ProfileId,
        ) -> Result<Option<MatchHistoryEntry>, StoreError> {
            Err(StoreError::Poisoned { store: "history" })
        }

        fn append(&self, _: &MatchHistoryEntry) -> Result<(), StoreError> {
            Err(StoreError::Poisoned { store: "history" })
        }

        fn history(
            &self,
            _: &ProfileId,
            _: &HistoryFilter,
        ) -> Result<Vec<MatchHistoryEntry>, StoreError> {
            Err(StoreError::Poisoned { store: "history" })
        }
    }

    #[rstest]
    fn history_failures_degrade_to_uncached_scoring() {
        let profiles = MemoryProfiles::with_profiles([organization("brand"), creator("alice")]);
        let context = Arc::new(ScoringContext::new(ScoringConfig::default()).expect("context"));
        let engine = MatchEngine::new(
            profiles,
            MemoryWeightOverrides::default(),
            BrokenHistory,
            context,
        );
        assert!(engine.get_or_compute(&id("brand"), &id("alice")).is_ok());
        assert!(engine.get_or_compute(&id("brand"), &id("alice")).is_ok());
        assert_eq!(engine.computations(), 2);
        assert!(matches!(
            engine.history(&id("brand"), &HistoryFilter::default()),
            Err(MatchError::History { .. })
        ));
    }
}
