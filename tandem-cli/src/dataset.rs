//! JSON inputs shared by every command.

use std::io::BufReader;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tandem_core::{CollaborationOutcome, Profile, WeightOverride};
use tandem_scorer::ScoringConfig;

use crate::CliError;

/// Profiles, outcomes and weight overrides exported from the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Creator and organisation profiles.
    #[serde(default)]
    pub profiles: Vec<Profile>,
    /// Recorded collaboration outcomes, in any order.
    #[serde(default)]
    pub outcomes: Vec<CollaborationOutcome>,
    /// Per-user custom weightings.
    #[serde(default)]
    pub overrides: Vec<WeightOverride>,
}

/// Check that `path` names an existing regular file.
pub(crate) fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn file_is_file(path: &Utf8Path) -> std::io::Result<bool> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| std::io::Error::other("path should include a file name"))?;
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.metadata(name).map(|meta| meta.is_file())
}

/// Decode a JSON file into `T`.
pub(crate) fn load_json<T: DeserializeOwned>(
    path: &Utf8Path,
    field: &'static str,
) -> Result<T, CliError> {
    let file = fs_utf8::File::open_ambient(path, ambient_authority()).map_err(|source| {
        CliError::OpenInput {
            field,
            path: path.to_path_buf(),
            source,
        }
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CliError::ParseInput {
        field,
        path: path.to_path_buf(),
        source,
    })
}

/// Scoring configuration from an optional JSON file, defaults otherwise.
pub(crate) fn load_scoring_config(
    path: Option<&Utf8Path>,
    field: &'static str,
) -> Result<ScoringConfig, CliError> {
    let config = match path {
        Some(path) => load_json::<ScoringConfig>(path, field)?,
        None => ScoringConfig::default(),
    };
    config.validate()?;
    Ok(config)
}
