//! Behavioural coverage for outcome ingestion and recalculation.

mod support;

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tandem_core::test_support::{creator, fitness_micro, fixed_time, organization, outcome};
use tandem_core::{BenchmarkVersion, Factor, MatchResult, ProfileId};
use tandem_scorer::{IngestError, IngestReceipt, ScoringConfig};

use support::{World, minutes_after_start};

#[fixture]
fn world() -> World {
    World::new(ScoringConfig::default())
}

#[fixture]
fn scored() -> RefCell<Option<MatchResult>> {
    RefCell::new(None)
}

#[fixture]
fn ingested() -> RefCell<Option<Result<IngestReceipt, IngestError>>> {
    RefCell::new(None)
}

fn record(world: &World, connection: &str, rating: u8, minutes: i64) {
    let mut recorded = outcome(connection, rating);
    recorded.recorded_at = minutes_after_start(minutes);
    if let Err(err) = world.feedback.ingest(&recorded) {
        panic!("ingest {connection}: {err}");
    }
}

#[given("a fitness brand and creator")]
fn fitness_pair(#[from(world)] world: &World) {
    world.profiles.upsert(organization("brand"));
    world.profiles.upsert(creator("creator"));
}

#[given("four earlier fitness collaborations rated 5")]
fn earlier_successes(#[from(world)] world: &World) {
    for minutes in 0..4 {
        record(world, &format!("early-{minutes}"), 5, minutes);
    }
}

#[given("a later fitness collaboration rated 1")]
fn later_failure(#[from(world)] world: &World) {
    record(world, "late", 1, 60);
}

#[given("three fitness collaborations reporting engagement")]
#[expect(
    clippy::float_arithmetic,
    reason = "engagement observations are spread evenly"
)]
fn engagement_reports(#[from(world)] world: &World) {
    for step in 0..3_u32 {
        let mut recorded = outcome(&format!("engaged-{step}"), 4);
        recorded.creator_engagement = Some(2.0 + f64::from(step));
        if let Err(err) = world.feedback.ingest(&recorded) {
            panic!("ingest engaged-{step}: {err}");
        }
    }
}

#[when("the brand scores the creator")]
fn brand_scores(
    #[from(world)] world: &World,
    #[from(scored)] scored: &RefCell<Option<MatchResult>>,
) {
    let result = world
        .engine
        .get_or_compute_at(
            &ProfileId::new("brand"),
            &ProfileId::new("creator"),
            minutes_after_start(90),
        )
        .unwrap_or_else(|err| panic!("score pair: {err}"));
    scored.replace(Some(result));
}

#[when("a fitness collaboration rated 6 is recorded")]
fn out_of_range_rating(
    #[from(world)] world: &World,
    #[from(ingested)] ingested: &RefCell<Option<Result<IngestReceipt, IngestError>>>,
) {
    ingested.replace(Some(world.feedback.ingest(&outcome("overrated", 6))));
}

#[when("the benchmarks are recalculated")]
fn recalculated(#[from(world)] world: &World) {
    if let Err(err) = world.feedback.recalculate_at(fixed_time()) {
        panic!("recalculate: {err}");
    }
}

#[then("historical success lies strictly between 50 and 100")]
fn historical_success_between(#[from(scored)] scored: &RefCell<Option<MatchResult>>) {
    let borrowed = scored.borrow();
    let result = borrowed
        .as_ref()
        .unwrap_or_else(|| panic!("the pair should have been scored"));
    let value = result
        .factors
        .get(Factor::HistoricalSuccess)
        .unwrap_or_else(|| panic!("historical success should be scored"));
    assert!(value > 50.0 && value < 100.0, "historical success {value}");
}

#[then("the outcome is rejected as invalid")]
fn rejected_invalid(
    #[from(ingested)] ingested: &RefCell<Option<Result<IngestReceipt, IngestError>>>,
) {
    let borrowed = ingested.borrow();
    assert!(matches!(
        borrowed.as_ref(),
        Some(Err(IngestError::Invalid { .. }))
    ));
}

#[then("no outcome is stored")]
fn nothing_stored(#[from(world)] world: &World) {
    let stats = world
        .feedback
        .stats()
        .unwrap_or_else(|err| panic!("stats: {err}"));
    assert_eq!(stats.total, 0);
    assert_eq!(
        world.engine.context().ledger().generation(Some(&fitness_micro())),
        0
    );
}

#[then("the benchmark version is 1")]
fn benchmark_version_one(#[from(world)] world: &World) {
    assert_eq!(
        world.engine.context().benchmarks().version(),
        BenchmarkVersion(1)
    );
}

#[then("the fitness benchmark holds 3 samples")]
fn fitness_samples(#[from(world)] world: &World) {
    let benchmark = world
        .engine
        .context()
        .benchmarks()
        .benchmark(Some(&fitness_micro()));
    assert_eq!(benchmark.sample_size, 3);
    assert!(benchmark.confidence > 0.0 && benchmark.confidence < 1.0);
}

#[scenario(path = "tests/features/feedback.feature", index = 0)]
fn recent_failure_weighs_most(
    world: World,
    scored: RefCell<Option<MatchResult>>,
    ingested: RefCell<Option<Result<IngestReceipt, IngestError>>>,
) {
    let _ = (world, scored, ingested);
}

#[scenario(path = "tests/features/feedback.feature", index = 1)]
fn out_of_range_rating_is_rejected(
    world: World,
    scored: RefCell<Option<MatchResult>>,
    ingested: RefCell<Option<Result<IngestReceipt, IngestError>>>,
) {
    let _ = (world, scored, ingested);
}

#[scenario(path = "tests/features/feedback.feature", index = 2)]
fn recalculation_publishes_next_version(
    world: World,
    scored: RefCell<Option<MatchResult>>,
    ingested: RefCell<Option<Result<IngestReceipt, IngestError>>>,
) {
    let _ = (world, scored, ingested);
}
