//! Benchmark store: accumulation windows and versioned snapshots.
//!
//! Observations accumulate per segment in bounded trailing windows.
//! [`BenchmarkStore::recalculate`] folds the windows into a fresh
//! [`BenchmarkSnapshot`] and swaps it in behind a single pointer, so readers
//! always see one complete version.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tandem_core::{
    Benchmark, BenchmarkVersion, CollaborationOutcome, EngagementBands, RateBand, Segment,
};

use crate::ScoringConfig;

/// One creator data point contributing to a segment benchmark.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Observation {
    /// Rate paid or quoted, if known.
    pub rate: Option<f64>,
    /// Engagement rate in percent, if known.
    pub engagement: Option<f64>,
}

impl Observation {
    /// Extract an observation from an outcome, if it carries any data.
    #[must_use]
    pub fn from_outcome(outcome: &CollaborationOutcome) -> Option<Self> {
        let observation = Self {
            rate: outcome.creator_rate.filter(|v| v.is_finite() && *v >= 0.0),
            engagement: outcome
                .creator_engagement
                .filter(|v| v.is_finite() && *v >= 0.0),
        };
        (observation.rate.is_some() || observation.engagement.is_some()).then_some(observation)
    }
}

/// Immutable set of segment benchmarks at one version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkSnapshot {
    version: BenchmarkVersion,
    segments: BTreeMap<Segment, Benchmark>,
}

impl BenchmarkSnapshot {
    /// Build a snapshot from pre-computed benchmarks.
    #[must_use]
    pub const fn new(version: BenchmarkVersion, segments: BTreeMap<Segment, Benchmark>) -> Self {
        Self { version, segments }
    }

    /// Version of the snapshot.
    #[must_use]
    pub const fn version(&self) -> BenchmarkVersion {
        self.version
    }

    /// Benchmark for `segment`, if the snapshot has one.
    #[must_use]
    pub fn get(&self, segment: &Segment) -> Option<&Benchmark> {
        self.segments.get(segment)
    }

    /// Benchmark for `segment`, or the neutral benchmark.
    ///
    /// Missing data is not an error: scoring falls back to the neutral
    /// benchmark and reports reduced confidence instead.
    #[must_use]
    pub fn benchmark_or_neutral(&self, segment: Option<&Segment>) -> Benchmark {
        match segment.and_then(|s| self.segments.get(s)) {
            Some(benchmark) => benchmark.clone(),
            None => {
                log::debug!(
                    "no benchmark for segment {}; using neutral benchmark",
                    segment.map_or_else(|| "<unknown>".to_owned(), ToString::to_string)
                );
                Benchmark::neutral()
            }
        }
    }

    /// Iterate segments in order.
    pub fn iter(&self) -> impl Iterator<Item = (&Segment, &Benchmark)> {
        self.segments.iter()
    }

    /// Number of segments with a benchmark.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the snapshot holds no benchmarks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Accumulates observations and publishes versioned benchmark snapshots.
#[derive(Debug)]
pub struct BenchmarkStore {
    windows: Mutex<HashMap<Segment, VecDeque<Observation>>>,
    current: RwLock<Arc<BenchmarkSnapshot>>,
    window: usize,
    min_sample_for_full_confidence: u32,
}

impl BenchmarkStore {
    /// Create an empty store sized by `config`.
    #[must_use]
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            current: RwLock::new(Arc::new(BenchmarkSnapshot::default())),
            window: config.benchmark_window.max(1),
            min_sample_for_full_confidence: config.min_sample_for_full_confidence,
        }
    }

    /// The snapshot currently served to readers.
    #[must_use]
    pub fn snapshot(&self) -> Arc<BenchmarkSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Current benchmark for `segment`; never fails.
    #[must_use]
    pub fn benchmark(&self, segment: Option<&Segment>) -> Benchmark {
        self.snapshot().benchmark_or_neutral(segment)
    }

    /// Version of the current snapshot.
    #[must_use]
    pub fn version(&self) -> BenchmarkVersion {
        self.snapshot().version()
    }

    /// Append an observation to the segment's trailing window.
    pub fn record(&self, segment: Segment, observation: Observation) {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window = windows.entry(segment).or_default();
        window.push_back(observation);
        while window.len() > self.window {
            window.pop_front();
        }
    }

    /// Forward an outcome's creator data to its segment window.
    ///
    /// Returns `false` when the outcome has no segment or no usable data.
    #[must_use]
    pub fn record_outcome(&self, outcome: &CollaborationOutcome) -> bool {
        let Some(segment) = outcome.segment.clone() else {
            return false;
        };
        match Observation::from_outcome(outcome) {
            Some(observation) => {
                self.record(segment, observation);
                true
            }
            None => false,
        }
    }

    /// Recompute benchmarks from the windows and publish the next version.
    #[must_use]
    pub fn recalculate(&self) -> BenchmarkVersion {
        self.recalculate_at(Utc::now())
    }

    /// [`BenchmarkStore::recalculate`] with an explicit timestamp.
    ///
    /// Segments without observations keep their previous benchmark, so
    /// snapshots loaded from an artefact survive recalculation. Running the
    /// recalculation twice at the same instant over the same windows yields
    /// identical benchmarks.
    #[must_use]
    pub fn recalculate_at(&self, now: DateTime<Utc>) -> BenchmarkVersion {
        let computed: Vec<(Segment, Benchmark)> = {
            let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
            windows
                .iter()
                .filter(|(_, window)| !window.is_empty())
                .map(|(segment, window)| {
                    (
                        segment.clone(),
                        aggregate(window, self.min_sample_for_full_confidence, now),
                    )
                })
                .collect()
        };
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut segments = current.segments.clone();
        let count = computed.len();
        segments.extend(computed);
        let version = current.version.next();
        *current = Arc::new(BenchmarkSnapshot::new(version, segments));
        drop(current);
        log::info!("recalculated benchmarks {version} ({count} segments updated)");
        version
    }

    /// Serve a pre-computed snapshot, keeping versions monotonic.
    #[must_use]
    pub fn install(&self, snapshot: BenchmarkSnapshot) -> BenchmarkVersion {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let version = snapshot.version.max(current.version.next());
        *current = Arc::new(BenchmarkSnapshot::new(version, snapshot.segments));
        version
    }

    /// Discard every window and benchmark.
    ///
    /// The version still advances so results cached before the reset are
    /// treated as stale.
    pub fn reset(&self) {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let version = current.version.next();
        *current = Arc::new(BenchmarkSnapshot::new(version, BTreeMap::new()));
    }
}

fn aggregate(
    window: &VecDeque<Observation>,
    min_sample_for_full_confidence: u32,
    now: DateTime<Utc>,
) -> Benchmark {
    let mut rates: Vec<f64> = window.iter().filter_map(|o| o.rate).collect();
    let mut engagements: Vec<f64> = window.iter().filter_map(|o| o.engagement).collect();
    rates.sort_by(f64::total_cmp);
    engagements.sort_by(f64::total_cmp);

    let rate_band = match (
        percentile(&rates, 0.25),
        percentile(&rates, 0.5),
        percentile(&rates, 0.75),
    ) {
        (Some(low), Some(median), Some(high)) => Some(RateBand { low, median, high }),
        _ => None,
    };
    let engagement = engagement_bands(&engagements).unwrap_or_default();
    let sample_size = u32::try_from(window.len()).unwrap_or(u32::MAX);
    Benchmark {
        rate_band,
        average_engagement: mean(&engagements),
        engagement,
        sample_size,
        confidence: Benchmark::confidence_for(sample_size, min_sample_for_full_confidence),
        recalculated_at: Some(now),
    }
}

fn engagement_bands(sorted: &[f64]) -> Option<EngagementBands> {
    Some(EngagementBands {
        p10: percentile(sorted, 0.1)?,
        p25: percentile(sorted, 0.25)?,
        p50: percentile(sorted, 0.5)?,
        p75: percentile(sorted, 0.75)?,
        p90: percentile(sorted, 0.9)?,
    })
}

/// Linear-interpolation percentile over an ascending slice.
#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "percentile ranks interpolate between neighbouring samples"
)]
pub(crate) fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = p.clamp(0.0, 1.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let low = *sorted.get(lower)?;
    let high = *sorted.get(upper)?;
    Some(low + (high - low) * (rank - lower as f64))
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "mean divides a sum by the sample count"
)]
fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
#[expect(
    clippy::float_arithmetic,
    reason = "fixtures derive observations arithmetically"
)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tandem_core::Tier;
    use tandem_core::test_support::{fixed_time, outcome};

    #[fixture]
    fn store() -> BenchmarkStore {
        BenchmarkStore::new(&ScoringConfig::default())
    }

    fn segment() -> Segment {
        Segment::new("fitness", Tier::Micro)
    }

    fn observe(store: &BenchmarkStore, rate: f64, engagement: f64) {
        store.record(
            segment(),
            Observation {
                rate: Some(rate),
                engagement: Some(engagement),
            },
        );
    }

    #[rstest]
    #[case(&[], 0.5, None)]
    #[case(&[4.0], 0.9, Some(4.0))]
    #[case(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.25, Some(2.0))]
    #[case(&[1.0, 2.0], 0.5, Some(1.5))]
    fn interpolates_percentiles(#[case] sorted: &[f64], #[case] p: f64, #[case] expected: Option<f64>) {
        assert_eq!(percentile(sorted, p), expected);
    }

    #[rstest]
    fn unknown_segments_get_the_neutral_benchmark(store: BenchmarkStore) {
        assert_eq!(store.benchmark(Some(&segment())), Benchmark::neutral());
        assert_eq!(store.benchmark(None), Benchmark::neutral());
    }

    #[rstest]
    fn readers_see_previous_version_until_recalculation(store: BenchmarkStore) {
        observe(&store, 1_000.0, 3.0);
        assert_eq!(store.version(), BenchmarkVersion(0));
        assert!(store.benchmark(Some(&segment())).is_neutral());

        let version = store.recalculate_at(fixed_time());
        assert_eq!(version, BenchmarkVersion(1));
        assert_eq!(store.benchmark(Some(&segment())).sample_size, 1);
    }

    #[rstest]
    fn recalculation_is_idempotent(store: BenchmarkStore) {
        for i in 0..10 {
            observe(&store, 1_000.0 + f64::from(i) * 100.0, 2.0 + f64::from(i) * 0.5);
        }
        assert_eq!(store.recalculate_at(fixed_time()), BenchmarkVersion(1));
        let first = store.benchmark(Some(&segment()));
        assert_eq!(store.recalculate_at(fixed_time()), BenchmarkVersion(2));
        let second = store.benchmark(Some(&segment()));
        assert_eq!(first, second);
    }

    #[rstest]
    fn computes_rate_band_and_confidence(store: BenchmarkStore) {
        for rate in [1_000.0, 2_000.0, 3_000.0, 4_000.0, 5_000.0] {
            observe(&store, rate, 4.0);
        }
        assert_eq!(store.recalculate_at(fixed_time()), BenchmarkVersion(1));
        let benchmark = store.benchmark(Some(&segment()));
        assert_eq!(
            benchmark.rate_band,
            Some(RateBand {
                low: 2_000.0,
                median: 3_000.0,
                high: 4_000.0
            })
        );
        assert_eq!(benchmark.average_engagement, Some(4.0));
        assert_eq!(benchmark.sample_size, 5);
        assert!((benchmark.confidence - 5.0 / 30.0).abs() < 1e-12);
    }

    #[rstest]
    fn window_drops_oldest_observations() {
        let config = ScoringConfig {
            benchmark_window: 3,
            ..ScoringConfig::default()
        };
        let store = BenchmarkStore::new(&config);
        for rate in [100.0, 200.0, 300.0, 400.0] {
            observe(&store, rate, 1.0);
        }
        assert_eq!(store.recalculate_at(fixed_time()), BenchmarkVersion(1));
        let benchmark = store.benchmark(Some(&segment()));
        assert_eq!(benchmark.sample_size, 3);
        assert_eq!(benchmark.rate_band.map(|band| band.median), Some(300.0));
    }

    #[rstest]
    fn outcomes_without_data_are_not_recorded(store: BenchmarkStore) {
        let bare = outcome("c-1", 5);
        assert!(!store.record_outcome(&bare));

        let mut with_rate = outcome("c-2", 5);
        with_rate.creator_rate = Some(2_500.0);
        assert!(store.record_outcome(&with_rate));
    }

    #[rstest]
    fn installed_snapshots_survive_recalculation(store: BenchmarkStore) {
        let other = Segment::new("gaming", Tier::Mid);
        let mut loaded = Benchmark::neutral();
        loaded.sample_size = 40;
        loaded.confidence = 1.0;
        let installed = store.install(BenchmarkSnapshot::new(
            BenchmarkVersion(7),
            BTreeMap::from([(other.clone(), loaded.clone())]),
        ));
        assert_eq!(installed, BenchmarkVersion(7));

        observe(&store, 1_000.0, 3.0);
        assert_eq!(store.recalculate_at(fixed_time()), BenchmarkVersion(8));
        assert_eq!(store.benchmark(Some(&other)), loaded);
    }

    #[rstest]
    fn reset_clears_data_and_advances_version(store: BenchmarkStore) {
        observe(&store, 1_000.0, 3.0);
        assert_eq!(store.recalculate_at(fixed_time()), BenchmarkVersion(1));
        store.reset();
        assert!(store.snapshot().is_empty());
        assert_eq!(store.version(), BenchmarkVersion(2));
        assert_eq!(store.recalculate_at(fixed_time()), BenchmarkVersion(3));
        assert!(store.snapshot().is_empty());
    }
}
