//! Command-line interface for Tandem's offline tooling.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};
use serde::Serialize;

mod benchmarks;
mod dataset;
mod error;
mod score;

pub use dataset::Dataset;
pub use error::CliError;

use benchmarks::{BenchmarksArgs, run_benchmarks};
use score::{ScoreArgs, run_score};

const ARG_BENCHMARKS_DATASET: &str = "dataset";
const ARG_BENCHMARKS_OUTPUT: &str = "output";
const ARG_SCORE_DATASET: &str = "dataset";
const ARG_SCORE_SUBJECT: &str = "subject";
const ARG_SCORE_CANDIDATE: &str = "candidate";
const ARG_SCORE_BENCHMARKS: &str = "benchmarks";
const ARG_SCORE_HISTORY_DB: &str = "history-db";
const ARG_SCORING_CONFIG: &str = "scoring-config";
const ENV_BENCHMARKS_DATASET: &str = "TANDEM_CMDS_BENCHMARKS_DATASET";
const ENV_SCORE_DATASET: &str = "TANDEM_CMDS_SCORE_DATASET";
const ENV_SCORE_SUBJECT: &str = "TANDEM_CMDS_SCORE_SUBJECT";

/// Run the Tandem CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments or configuration are invalid, an
/// input cannot be read, or scoring fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Benchmarks(args) => run_benchmarks(args),
        Command::Score(args) => run_score(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "tandem",
    about = "Offline benchmark and scoring utilities for the Tandem matching engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a benchmark artefact from a dataset's outcomes.
    Benchmarks(BenchmarksArgs),
    /// Rank candidates for one subject.
    Score(ScoreArgs),
}

fn write_json<T: Serialize>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
