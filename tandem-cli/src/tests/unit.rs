//! Focused unit tests covering command configuration and execution.

use std::collections::BTreeMap;

use super::helpers::{Workspace, later, sample_dataset, write_utf8};
use super::*;
use crate::benchmarks::{BenchmarksConfig, build_benchmarks};
use crate::dataset::load_scoring_config;
use crate::score::{ScoreConfig, counterparts, execute_score};
use rstest::rstest;
use tandem_core::test_support::{creator, organization};
use tandem_core::{
    BenchmarkVersion, Factor, ProfileId, Segment, Tier, WeightOverride, WeightVersion,
};
use tandem_scorer::{ConfigError, read_benchmark_file};

fn ids(raw: &[&str]) -> Vec<ProfileId> {
    raw.iter().map(|id| ProfileId::new(*id)).collect()
}

fn score_config(workspace: &Workspace, candidates: &[&str]) -> ScoreConfig {
    ScoreConfig {
        dataset: workspace.write_dataset(&sample_dataset()),
        subject: ProfileId::new("brand"),
        candidates: ids(candidates),
        benchmarks: None,
        history_db: None,
        scoring_config: None,
    }
}

#[rstest]
fn benchmarks_without_dataset_errors() {
    let err = BenchmarksConfig::try_from(BenchmarksArgs::default())
        .expect_err("missing dataset should error");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_BENCHMARKS_DATASET);
            assert_eq!(env, ENV_BENCHMARKS_DATASET);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn benchmarks_output_defaults_to_working_directory() {
    let args = BenchmarksArgs {
        dataset: Some("dataset.json".into()),
        ..BenchmarksArgs::default()
    };
    let config = BenchmarksConfig::try_from(args).expect("config should build");
    assert_eq!(config.output.as_str(), "benchmarks.bin");
}

#[rstest]
fn score_without_subject_errors() {
    let args = ScoreArgs {
        dataset: Some("dataset.json".into()),
        ..ScoreArgs::default()
    };
    let err = ScoreConfig::try_from(args).expect_err("missing subject should error");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_SCORE_SUBJECT);
            assert_eq!(env, ENV_SCORE_SUBJECT);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn validate_sources_reports_missing_and_directory_inputs() {
    let workspace = Workspace::new();
    let missing = BenchmarksConfig {
        dataset: workspace.path("absent.json"),
        output: workspace.path("benchmarks.bin"),
        scoring_config: None,
    };
    match missing.validate_sources() {
        Err(CliError::MissingSourceFile { field, .. }) => {
            assert_eq!(field, ARG_BENCHMARKS_DATASET);
        }
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }

    let directory = workspace.path("nested");
    std::fs::create_dir(directory.as_std_path()).expect("create directory");
    let not_file = BenchmarksConfig {
        dataset: directory,
        ..missing
    };
    match not_file.validate_sources() {
        Err(CliError::SourcePathNotFile { field, .. }) => {
            assert_eq!(field, ARG_BENCHMARKS_DATASET);
        }
        other => panic!("expected SourcePathNotFile, found {other:?}"),
    }
}

#[rstest]
fn invalid_scoring_config_is_rejected() {
    let workspace = Workspace::new();
    let path = workspace.path("scoring.json");
    write_utf8(&path, br#"{"recencyDecay": 0}"#);
    let err = load_scoring_config(Some(&path), ARG_SCORING_CONFIG).expect_err("invalid decay");
    assert!(matches!(
        err,
        CliError::ScoringConfig(ConfigError::Invalid {
            field: "recencyDecay",
            ..
        })
    ));
}

#[rstest]
fn counterparts_are_the_opposite_role() {
    let brand = organization("brand");
    let profiles = vec![
        brand.clone(),
        creator("alice"),
        organization("rival"),
        creator("bob"),
    ];
    assert_eq!(counterparts(&brand, &profiles), ids(&["alice", "bob"]));
}

#[rstest]
fn benchmark_artefact_records_valid_outcomes() {
    let workspace = Workspace::new();
    let config = BenchmarksConfig {
        dataset: workspace.write_dataset(&sample_dataset()),
        output: workspace.path("out/benchmarks.bin"),
        scoring_config: None,
    };
    let summary = build_benchmarks(&config, later(0)).expect("build benchmarks");
    assert_eq!(summary.outcomes, 5);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.segments, 1);
    assert_eq!(summary.benchmark_version, BenchmarkVersion(1));

    let snapshot = read_benchmark_file(&config.output).expect("read artefact");
    let fitness = snapshot
        .get(&Segment::new("fitness", Tier::Micro))
        .expect("fitness benchmark");
    assert_eq!(fitness.sample_size, 5);
    assert!(fitness.rate_band.is_some());
}

#[rstest]
fn score_ranks_every_counterpart_by_default() {
    let workspace = Workspace::new();
    let comparison = execute_score(&score_config(&workspace, &[]), later(0)).expect("score");
    let ranked: Vec<_> = comparison
        .ranked
        .iter()
        .map(|m| m.result.candidate_id.as_str().to_owned())
        .collect();
    assert_eq!(ranked, ["alice", "bob"]);
    assert_eq!(comparison.subject_id, ProfileId::new("brand"));
}

#[rstest]
fn score_restricts_to_named_candidates() {
    let workspace = Workspace::new();
    let comparison = execute_score(&score_config(&workspace, &["bob"]), later(0)).expect("score");
    assert_eq!(comparison.ranked.len(), 1);
}

#[rstest]
fn unknown_subject_is_reported() {
    let workspace = Workspace::new();
    let config = ScoreConfig {
        subject: ProfileId::new("nobody"),
        ..score_config(&workspace, &[])
    };
    match execute_score(&config, later(0)) {
        Err(CliError::UnknownSubject { id }) => assert_eq!(id, ProfileId::new("nobody")),
        other => panic!("expected UnknownSubject, found {other:?}"),
    }
}

#[cfg(feature = "store-sqlite")]
#[rstest]
fn history_database_serves_later_runs() {
    let workspace = Workspace::new();
    let config = ScoreConfig {
        history_db: Some(workspace.path("history.db")),
        ..score_config(&workspace, &["alice"])
    };
    let first = execute_score(&config, later(0)).expect("first run");
    let second = execute_score(&config, later(30)).expect("second run");
    let computed = |comparison: &tandem_core::Comparison| {
        comparison
            .ranked
            .first()
            .map(|m| m.result.computed_at)
            .expect("one ranked result")
    };
    assert_eq!(computed(&first), later(0));
    assert_eq!(computed(&second), later(0));
}

#[cfg(feature = "store-sqlite")]
#[rstest]
fn history_database_is_not_reused_after_the_dataset_changes() {
    let workspace = Workspace::new();
    let config = ScoreConfig {
        history_db: Some(workspace.path("history.db")),
        ..score_config(&workspace, &["alice"])
    };
    let first = execute_score(&config, later(0)).expect("first run");

    let mut changed = sample_dataset();
    for recorded in changed.outcomes.iter_mut().filter(|o| o.success_rating <= 5) {
        recorded.success_rating = 1;
    }
    workspace.write_dataset(&changed);
    let second = execute_score(&config, later(30)).expect("second run");

    let only = |comparison: &tandem_core::Comparison| {
        comparison
            .ranked
            .first()
            .map(|m| m.result.clone())
            .expect("one ranked result")
    };
    assert_eq!(only(&second).computed_at, later(30));
    assert_ne!(only(&first).factors, only(&second).factors);
}

#[rstest]
fn dataset_override_revisions_are_kept() {
    let workspace = Workspace::new();
    let mut dataset = sample_dataset();
    dataset.overrides.push(WeightOverride {
        user_id: ProfileId::new("brand"),
        weights: BTreeMap::from([(Factor::BudgetAlignment, 1.0)]),
        revision: 12,
    });
    let config = score_config(&workspace, &["alice"]);
    assert_eq!(workspace.write_dataset(&dataset), config.dataset);
    let comparison = execute_score(&config, later(0)).expect("score");
    let version = comparison
        .ranked
        .first()
        .map(|m| m.result.weights_used.version())
        .expect("one ranked result");
    assert_eq!(version, WeightVersion::custom_at(12));
}
