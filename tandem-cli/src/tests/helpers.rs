//! Test helpers for composing datasets and temporary workspaces.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Duration, Utc};
use tandem_core::test_support::{creator, fixed_time, organization, outcome};
use tandem_core::PriceRange;
use tempfile::TempDir;

use crate::Dataset;

pub(super) fn write_utf8(path: &Utf8Path, bytes: &[u8]) {
    fs::write(path.as_std_path(), bytes).expect("write file");
}

/// Temporary directory addressed through UTF-8 paths.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root =
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Write `dataset` as JSON and return its path.
    pub(super) fn write_dataset(&self, dataset: &Dataset) -> Utf8PathBuf {
        let path = self.path("dataset.json");
        let payload = serde_json::to_vec_pretty(dataset).expect("serialise dataset");
        write_utf8(&path, &payload);
        path
    }
}

pub(super) fn later(minutes: i64) -> DateTime<Utc> {
    fixed_time() + Duration::minutes(minutes)
}

/// A brand, a creator inside its budget and one priced far above it, plus
/// five fitness outcomes reporting engagement and one invalid outcome.
pub(super) fn sample_dataset() -> Dataset {
    let mut outcomes: Vec<_> = (0..5_u8)
        .map(|step| {
            let mut recorded = outcome(&format!("c-{step}"), 4);
            recorded.creator_engagement = Some(f64::from(step.saturating_add(2)));
            recorded.creator_rate = Some(f64::from(step).mul_add(250.0, 2_000.0));
            recorded
        })
        .collect();
    outcomes.push(outcome("c-invalid", 9));
    Dataset {
        profiles: vec![
            organization("brand"),
            creator("alice").with_rate(PriceRange::point(3_000.0)),
            creator("bob").with_rate(PriceRange::new(8_000.0, 12_000.0)),
        ],
        outcomes,
        overrides: Vec::new(),
    }
}
