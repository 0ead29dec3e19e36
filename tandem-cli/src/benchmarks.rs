//! Benchmarks command implementation for the Tandem CLI.

use std::io::Write;
use std::sync::Arc;

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tandem_core::{BenchmarkVersion, CollaborationOutcome, MemoryOutcomeStore, OutcomeStore};
use tandem_scorer::{FeedbackLoop, IngestError, ScoringContext, write_benchmark_file};

use crate::dataset::{Dataset, load_json, load_scoring_config, require_existing};
use crate::{
    ARG_BENCHMARKS_DATASET, ARG_BENCHMARKS_OUTPUT, ARG_SCORING_CONFIG, CliError,
    ENV_BENCHMARKS_DATASET, write_json,
};

/// CLI arguments for the `benchmarks` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Fold every outcome in a JSON dataset into niche/tier \
                 benchmarks and write the resulting snapshot as a binary \
                 artefact that the score command can load.",
    about = "Build a benchmark artefact from recorded outcomes"
)]
#[ortho_config(prefix = "TANDEM")]
pub(crate) struct BenchmarksArgs {
    /// Path to a JSON dataset of profiles and outcomes.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) dataset: Option<Utf8PathBuf>,
    /// Where to write the artefact (`benchmarks.bin` by default).
    #[arg(long = ARG_BENCHMARKS_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// JSON file overriding scoring constants.
    #[arg(long = ARG_SCORING_CONFIG, value_name = "path")]
    #[serde(default)]
    pub(crate) scoring_config: Option<Utf8PathBuf>,
}

impl BenchmarksArgs {
    pub(crate) fn into_config(self) -> Result<BenchmarksConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        BenchmarksConfig::try_from(merged)
    }
}

/// Resolved `benchmarks` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BenchmarksConfig {
    pub(crate) dataset: Utf8PathBuf,
    pub(crate) output: Utf8PathBuf,
    pub(crate) scoring_config: Option<Utf8PathBuf>,
}

impl BenchmarksConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.dataset, ARG_BENCHMARKS_DATASET)?;
        if let Some(path) = &self.scoring_config {
            require_existing(path, ARG_SCORING_CONFIG)?;
        }
        Ok(())
    }
}

impl TryFrom<BenchmarksArgs> for BenchmarksConfig {
    type Error = CliError;

    fn try_from(args: BenchmarksArgs) -> Result<Self, Self::Error> {
        let dataset = args.dataset.ok_or(CliError::MissingArgument {
            field: ARG_BENCHMARKS_DATASET,
            env: ENV_BENCHMARKS_DATASET,
        })?;
        let output = args
            .output
            .unwrap_or_else(|| Utf8PathBuf::from("benchmarks.bin"));
        Ok(Self {
            dataset,
            output,
            scoring_config: args.scoring_config,
        })
    }
}

/// Summary printed after the artefact is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BenchmarksSummary {
    pub(crate) output: Utf8PathBuf,
    pub(crate) benchmark_version: BenchmarkVersion,
    pub(crate) segments: usize,
    pub(crate) outcomes: usize,
    pub(crate) rejected: usize,
}

pub(super) fn run_benchmarks(args: BenchmarksArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_benchmarks_with(args, Utc::now(), &mut stdout)
}

pub(super) fn run_benchmarks_with(
    args: BenchmarksArgs,
    now: DateTime<Utc>,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let summary = build_benchmarks(&config, now)?;
    write_json(writer, &summary)
}

pub(crate) fn build_benchmarks(
    config: &BenchmarksConfig,
    now: DateTime<Utc>,
) -> Result<BenchmarksSummary, CliError> {
    let dataset: Dataset = load_json(&config.dataset, ARG_BENCHMARKS_DATASET)?;
    let scoring = load_scoring_config(config.scoring_config.as_deref(), ARG_SCORING_CONFIG)?;
    let context = Arc::new(ScoringContext::new(scoring)?);
    let feedback = FeedbackLoop::new(MemoryOutcomeStore::default(), Arc::clone(&context));
    let (outcomes, rejected) = fold_outcomes(&feedback, &dataset.outcomes)?;
    let report = feedback.recalculate_at(now)?;
    write_benchmark_file(&context.benchmarks().snapshot(), &config.output)?;
    Ok(BenchmarksSummary {
        output: config.output.clone(),
        benchmark_version: report.benchmark_version,
        segments: report.segments,
        outcomes,
        rejected,
    })
}

/// Ingest `outcomes`, skipping invalid ones.
///
/// Returns the number folded in and the number rejected.
pub(crate) fn fold_outcomes<O: OutcomeStore>(
    feedback: &FeedbackLoop<O>,
    outcomes: &[CollaborationOutcome],
) -> Result<(usize, usize), CliError> {
    let mut folded = 0;
    let mut rejected = 0;
    for outcome in outcomes {
        match feedback.ingest(outcome) {
            Ok(_) => folded += 1,
            Err(IngestError::Invalid { .. }) => rejected += 1,
            Err(err) => return Err(err.into()),
        }
    }
    Ok((folded, rejected))
}

