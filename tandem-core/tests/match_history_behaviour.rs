//! Behavioural coverage for the SQLite-backed match history store.
#![cfg(feature = "store-sqlite")]

use std::cell::RefCell;

use chrono::{Duration, TimeZone, Utc};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tandem_core::{
    BenchmarkVersion, CacheStamp, Factor, FactorSet, HistoryFilter, InputDigest,
    MatchHistoryEntry, MatchHistoryStore, MatchResult, MatchTier, ProfileId, SqliteMatchStore,
    WeightVector, WeightVersion,
};
use tempfile::TempDir;

#[fixture]
fn temp_dir() -> TempDir {
    match TempDir::new() {
        Ok(dir) => dir,
        Err(err) => panic!("create temporary directory: {err}"),
    }
}

#[fixture]
fn store() -> RefCell<Option<SqliteMatchStore>> {
    RefCell::new(None)
}

fn entry(score: u8, minutes: i64) -> MatchHistoryEntry {
    let base = Utc
        .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("valid timestamp"));
    MatchHistoryEntry {
        stamp: CacheStamp {
            weights: WeightVersion::default_at(0),
            benchmarks: BenchmarkVersion(minutes.unsigned_abs()),
            history_generation: 0,
            inputs: Some(InputDigest([score; 32])),
        },
        result: MatchResult {
            subject_id: ProfileId::new("org-1"),
            candidate_id: ProfileId::new("creator-1"),
            score,
            confidence: 80,
            tier: MatchTier::from_score(score),
            success_probability: 60,
            factors: FactorSet::neutral(&Factor::BASE),
            weights_used: WeightVector::default(),
            reasoning: vec!["Strong budget alignment".to_owned()],
            weaknesses: Vec::new(),
            computed_at: base + Duration::minutes(minutes),
        },
    }
}

fn with_store<R>(store: &RefCell<Option<SqliteMatchStore>>, f: impl FnOnce(&SqliteMatchStore) -> R) -> R {
    let binding = store.borrow();
    let store = binding
        .as_ref()
        .unwrap_or_else(|| panic!("store must be initialised"));
    f(store)
}

#[given("a SQLite match history store")]
fn sqlite_store(temp_dir: &TempDir, store: &RefCell<Option<SqliteMatchStore>>) {
    let opened = SqliteMatchStore::open(temp_dir.path().join("history.db"))
        .unwrap_or_else(|err| panic!("open store: {err}"));
    *store.borrow_mut() = Some(opened);
}

#[when("a result scoring 60 and then a result scoring 75 are recorded for the same pair")]
fn record_two(store: &RefCell<Option<SqliteMatchStore>>) {
    with_store(store, |s| {
        s.append(&entry(60, 0))
            .unwrap_or_else(|err| panic!("append first: {err}"));
        s.append(&entry(75, 10))
            .unwrap_or_else(|err| panic!("append second: {err}"));
    });
}

#[then("the latest entry for the pair scores 75")]
fn latest_scores_75(store: &RefCell<Option<SqliteMatchStore>>) {
    let latest = with_store(store, |s| {
        s.latest(&ProfileId::new("org-1"), &ProfileId::new("creator-1"))
            .unwrap_or_else(|err| panic!("read latest: {err}"))
    });
    let latest = latest.unwrap_or_else(|| panic!("latest entry"));
    assert_eq!(latest.result.score, 75);
    assert_eq!(latest.stamp.inputs, Some(InputDigest([75; 32])));
}

#[then("the subject history lists both entries newest first")]
fn history_lists_both(store: &RefCell<Option<SqliteMatchStore>>) {
    let history = with_store(store, |s| {
        s.history(&ProfileId::new("org-1"), &HistoryFilter::default())
            .unwrap_or_else(|err| panic!("read history: {err}"))
    });
    let scores: Vec<u8> = history.iter().map(|e| e.result.score).collect();
    assert_eq!(scores, [75, 60]);
}

#[then("filtering for scores of at least 70 returns only the 75 entry")]
fn filtered_history(store: &RefCell<Option<SqliteMatchStore>>) {
    let history = with_store(store, |s| {
        s.history(
            &ProfileId::new("org-1"),
            &HistoryFilter::default().with_min_score(70),
        )
        .unwrap_or_else(|err| panic!("read history: {err}"))
    });
    assert_eq!(history.len(), 1);
    assert_eq!(history.first().map(|e| e.result.score), Some(75));
}

#[then("the latest entry for an unknown pair is empty")]
fn unknown_pair(store: &RefCell<Option<SqliteMatchStore>>) {
    let latest = with_store(store, |s| {
        s.latest(&ProfileId::new("org-1"), &ProfileId::new("nobody"))
            .unwrap_or_else(|err| panic!("read latest: {err}"))
    });
    assert!(latest.is_none());
}

#[scenario(path = "tests/features/match_history.feature", index = 0)]
fn recomputation_supersedes(temp_dir: TempDir, store: RefCell<Option<SqliteMatchStore>>) {
    let _ = (temp_dir, store);
}

#[scenario(path = "tests/features/match_history.feature", index = 1)]
fn filtered_queries(temp_dir: TempDir, store: RefCell<Option<SqliteMatchStore>>) {
    let _ = (temp_dir, store);
}

#[scenario(path = "tests/features/match_history.feature", index = 2)]
fn unknown_pairs(temp_dir: TempDir, store: RefCell<Option<SqliteMatchStore>>) {
    let _ = (temp_dir, store);
}
