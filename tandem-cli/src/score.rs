//! Score command implementation for the Tandem CLI.

use std::io::Write;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tandem_core::{
    Comparison, MatchHistoryStore, MemoryHistoryStore, MemoryOutcomeStore, MemoryProfiles,
    MemoryWeightOverrides, Profile, ProfileId,
};
use tandem_scorer::{FeedbackLoop, MatchEngine, ScoringContext, read_benchmark_file};

use crate::benchmarks::fold_outcomes;
use crate::dataset::{Dataset, load_json, load_scoring_config, require_existing};
use crate::{
    ARG_SCORE_BENCHMARKS, ARG_SCORE_CANDIDATE, ARG_SCORE_DATASET, ARG_SCORE_HISTORY_DB,
    ARG_SCORE_SUBJECT, ARG_SCORING_CONFIG, CliError, ENV_SCORE_DATASET, ENV_SCORE_SUBJECT,
    write_json,
};

/// CLI arguments for the `score` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Score and rank candidates for one subject from a JSON \
                 dataset. Without --candidate every profile of the opposite \
                 role is ranked. Benchmarks come from an artefact written by \
                 the benchmarks command, or are recalculated from the \
                 dataset's outcomes.",
    about = "Rank candidates for a subject"
)]
#[ortho_config(prefix = "TANDEM")]
pub(crate) struct ScoreArgs {
    /// Path to a JSON dataset of profiles and outcomes.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) dataset: Option<Utf8PathBuf>,
    /// Profile requesting the comparison.
    #[arg(long = ARG_SCORE_SUBJECT, value_name = "id")]
    #[serde(default)]
    pub(crate) subject: Option<String>,
    /// Candidate to score; repeat for several.
    #[arg(long = ARG_SCORE_CANDIDATE, value_name = "id")]
    #[serde(default)]
    pub(crate) candidate: Vec<String>,
    /// Benchmark artefact written by the benchmarks command.
    #[arg(long = ARG_SCORE_BENCHMARKS, value_name = "path")]
    #[serde(default)]
    pub(crate) benchmarks: Option<Utf8PathBuf>,
    /// SQLite database persisting match history between runs.
    #[arg(long = ARG_SCORE_HISTORY_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) history_db: Option<Utf8PathBuf>,
    /// JSON file overriding scoring constants.
    #[arg(long = ARG_SCORING_CONFIG, value_name = "path")]
    #[serde(default)]
    pub(crate) scoring_config: Option<Utf8PathBuf>,
}

impl ScoreArgs {
    pub(crate) fn into_config(self) -> Result<ScoreConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ScoreConfig::try_from(merged)
    }
}

/// Resolved `score` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScoreConfig {
    pub(crate) dataset: Utf8PathBuf,
    pub(crate) subject: ProfileId,
    pub(crate) candidates: Vec<ProfileId>,
    pub(crate) benchmarks: Option<Utf8PathBuf>,
    pub(crate) history_db: Option<Utf8PathBuf>,
    pub(crate) scoring_config: Option<Utf8PathBuf>,
}

impl ScoreConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.dataset, ARG_SCORE_DATASET)?;
        if let Some(path) = &self.benchmarks {
            require_existing(path, ARG_SCORE_BENCHMARKS)?;
        }
        if let Some(path) = &self.scoring_config {
            require_existing(path, ARG_SCORING_CONFIG)?;
        }
        Ok(())
    }
}

impl TryFrom<ScoreArgs> for ScoreConfig {
    type Error = CliError;

    fn try_from(args: ScoreArgs) -> Result<Self, Self::Error> {
        let dataset = args.dataset.ok_or(CliError::MissingArgument {
            field: ARG_SCORE_DATASET,
            env: ENV_SCORE_DATASET,
        })?;
        let subject = args.subject.ok_or(CliError::MissingArgument {
            field: ARG_SCORE_SUBJECT,
            env: ENV_SCORE_SUBJECT,
        })?;
        Ok(Self {
            dataset,
            subject: ProfileId::new(subject),
            candidates: args.candidate.into_iter().map(ProfileId::new).collect(),
            benchmarks: args.benchmarks,
            history_db: args.history_db,
            scoring_config: args.scoring_config,
        })
    }
}

pub(super) fn run_score(args: ScoreArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_score_with(args, Utc::now(), &mut stdout)
}

pub(super) fn run_score_with(
    args: ScoreArgs,
    now: DateTime<Utc>,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let comparison = execute_score(&config, now)?;
    write_json(writer, &comparison)
}

pub(crate) fn execute_score(
    config: &ScoreConfig,
    now: DateTime<Utc>,
) -> Result<Comparison, CliError> {
    let dataset: Dataset = load_json(&config.dataset, ARG_SCORE_DATASET)?;
    let scoring = load_scoring_config(config.scoring_config.as_deref(), ARG_SCORING_CONFIG)?;
    let context = Arc::new(ScoringContext::new(scoring)?);

    let feedback = FeedbackLoop::new(MemoryOutcomeStore::default(), Arc::clone(&context));
    let (folded, rejected) = fold_outcomes(&feedback, &dataset.outcomes)?;
    log::debug!("folded {folded} outcomes, rejected {rejected}");
    match &config.benchmarks {
        Some(path) => {
            let version = context.benchmarks().install(read_benchmark_file(path)?);
            log::debug!("serving benchmarks {version} from {path}");
        }
        None => {
            feedback.recalculate_at(now)?;
        }
    }

    let subject = dataset
        .profiles
        .iter()
        .find(|profile| profile.id == config.subject)
        .ok_or_else(|| CliError::UnknownSubject {
            id: config.subject.clone(),
        })?;
    let candidates = if config.candidates.is_empty() {
        counterparts(subject, &dataset.profiles)
    } else {
        config.candidates.clone()
    };

    let overrides = MemoryWeightOverrides::default();
    for weights in dataset.overrides {
        overrides.insert(weights);
    }
    let profiles = MemoryProfiles::with_profiles(dataset.profiles.iter().cloned());
    let request = Ranking {
        profiles,
        overrides,
        context,
        subject: &config.subject,
        candidates: &candidates,
        now,
    };
    match &config.history_db {
        Some(path) => request.run(open_history(path)?),
        None => request.run(MemoryHistoryStore::default()),
    }
}

/// Every profile on the other side of a collaboration from `subject`.
pub(crate) fn counterparts(subject: &Profile, profiles: &[Profile]) -> Vec<ProfileId> {
    profiles
        .iter()
        .filter(|profile| profile.role != subject.role)
        .map(|profile| profile.id.clone())
        .collect()
}

struct Ranking<'a> {
    profiles: MemoryProfiles,
    overrides: MemoryWeightOverrides,
    context: Arc<ScoringContext>,
    subject: &'a ProfileId,
    candidates: &'a [ProfileId],
    now: DateTime<Utc>,
}

impl Ranking<'_> {
    fn run<H: MatchHistoryStore>(self, history: H) -> Result<Comparison, CliError> {
        let engine = MatchEngine::new(self.profiles, self.overrides, history, self.context);
        let comparison = engine.compare_batch_at(self.subject, self.candidates, self.now)?;
        let fallbacks = engine.fallback_count();
        if fallbacks > 0 {
            log::warn!("{fallbacks} weight override(s) were rejected; defaults used");
        }
        Ok(comparison)
    }
}

#[cfg(feature = "store-sqlite")]
fn open_history(path: &Utf8Path) -> Result<tandem_core::SqliteMatchStore, CliError> {
    tandem_core::SqliteMatchStore::open(path.as_std_path()).map_err(|source| {
        CliError::OpenHistory {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(feature = "store-sqlite"))]
fn open_history(_path: &Utf8Path) -> Result<MemoryHistoryStore, CliError> {
    Err(CliError::MissingFeature {
        feature: "store-sqlite",
        action: "--history-db",
    })
}
