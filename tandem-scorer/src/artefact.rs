//! Binary benchmark artefacts.
//!
//! Offline recalculation can persist a [`BenchmarkSnapshot`] so request-time
//! scoring starts from pre-computed benchmarks. The file is a `bincode`
//! header (`TBMK` magic and a format version) followed by the snapshot body.

use std::io::{BufReader, BufWriter, Write};

use bincode::Options;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use serde::{Deserialize, Serialize};
use tandem_core::{Benchmark, BenchmarkVersion, Segment};

use crate::ArtefactError;
use crate::benchmark::BenchmarkSnapshot;

/// Magic bytes opening every benchmark artefact.
pub const BENCHMARK_MAGIC: [u8; 4] = *b"TBMK";
/// Format version written by this build.
pub const BENCHMARK_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    version: u16,
}

#[derive(Debug, Serialize, Deserialize)]
struct Body {
    snapshot_version: BenchmarkVersion,
    segments: Vec<(Segment, Benchmark)>,
}

/// Bincode configuration for benchmark artefacts.
#[must_use]
pub fn benchmark_bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
}

/// Persist `snapshot` at `path`, creating parent directories.
///
/// # Errors
/// Returns [`ArtefactError`] when the directory or file cannot be created
/// or the snapshot cannot be encoded.
pub fn write_benchmark_file(
    snapshot: &BenchmarkSnapshot,
    path: &Utf8Path,
) -> Result<(), ArtefactError> {
    let parent = parent_of(path);
    fs_utf8::Dir::create_ambient_dir_all(&parent, ambient_authority()).map_err(|source| {
        ArtefactError::CreateParent {
            path: parent.clone(),
            source,
        }
    })?;
    let write_error = |source| ArtefactError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&parent, ambient_authority()).map_err(write_error)?;
    let name = path
        .file_name()
        .ok_or_else(|| write_error(std::io::Error::other("artefact path has no file name")))?;
    let file = dir.create(name).map_err(write_error)?;
    let mut writer = BufWriter::new(file);

    let serialise_error = |source| ArtefactError::Serialise {
        path: path.to_path_buf(),
        source,
    };
    let header = Header {
        magic: BENCHMARK_MAGIC,
        version: BENCHMARK_FORMAT_VERSION,
    };
    let body = Body {
        snapshot_version: snapshot.version(),
        segments: snapshot
            .iter()
            .map(|(segment, benchmark)| (segment.clone(), benchmark.clone()))
            .collect(),
    };
    benchmark_bincode_options()
        .serialize_into(&mut writer, &header)
        .map_err(serialise_error)?;
    benchmark_bincode_options()
        .serialize_into(&mut writer, &body)
        .map_err(serialise_error)?;
    writer.flush().map_err(write_error)
}

/// Load a snapshot written by [`write_benchmark_file`].
///
/// # Errors
/// Returns [`ArtefactError`] when the file cannot be opened, carries the
/// wrong magic or version, or fails to decode.
pub fn read_benchmark_file(path: &Utf8Path) -> Result<BenchmarkSnapshot, ArtefactError> {
    let file = fs_utf8::File::open_ambient(path, ambient_authority()).map_err(|source| {
        ArtefactError::Open {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let mut reader = BufReader::new(file);
    let decode_error = |source| ArtefactError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let header: Header = benchmark_bincode_options()
        .deserialize_from(&mut reader)
        .map_err(decode_error)?;
    if header.magic != BENCHMARK_MAGIC {
        return Err(ArtefactError::InvalidMagic {
            expected: BENCHMARK_MAGIC,
            found: header.magic,
        });
    }
    if header.version != BENCHMARK_FORMAT_VERSION {
        return Err(ArtefactError::UnsupportedVersion {
            found: header.version,
            supported: BENCHMARK_FORMAT_VERSION,
        });
    }
    let body: Body = benchmark_bincode_options()
        .deserialize_from(&mut reader)
        .map_err(decode_error)?;
    Ok(BenchmarkSnapshot::new(
        body.snapshot_version,
        body.segments.into_iter().collect(),
    ))
}

fn parent_of(path: &Utf8Path) -> Utf8PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};
    use std::collections::BTreeMap;
    use tandem_core::{EngagementBands, RateBand, Tier};
    use tempfile::TempDir;

    #[fixture]
    fn snapshot() -> BenchmarkSnapshot {
        let benchmark = Benchmark {
            rate_band: Some(RateBand {
                low: 800.0,
                median: 1_200.0,
                high: 2_000.0,
            }),
            average_engagement: Some(4.2),
            engagement: EngagementBands::default(),
            sample_size: 12,
            confidence: 0.4,
            recalculated_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single(),
        };
        BenchmarkSnapshot::new(
            BenchmarkVersion(4),
            BTreeMap::from([(Segment::new("fitness", Tier::Micro), benchmark)]),
        )
    }

    fn artefact_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("utf-8 temp path")
    }

    #[rstest]
    fn snapshot_survives_a_round_trip(snapshot: BenchmarkSnapshot) {
        let dir = TempDir::new().expect("temp dir");
        let path = artefact_path(&dir, "nested/benchmarks.bin");
        write_benchmark_file(&snapshot, &path).expect("write artefact");
        let loaded = read_benchmark_file(&path).expect("read artefact");
        assert_eq!(loaded, snapshot);
    }

    #[rstest]
    fn rejects_foreign_magic() {
        let dir = TempDir::new().expect("temp dir");
        let path = artefact_path(&dir, "foreign.bin");
        let mut bytes = Vec::new();
        benchmark_bincode_options()
            .serialize_into(
                &mut bytes,
                &Header {
                    magic: *b"NOPE",
                    version: BENCHMARK_FORMAT_VERSION,
                },
            )
            .expect("encode header");
        std::fs::write(&path, bytes).expect("write bytes");
        let err = read_benchmark_file(&path).expect_err("bad magic");
        assert!(matches!(err, ArtefactError::InvalidMagic { found, .. } if found == *b"NOPE"));
    }

    #[rstest]
    fn rejects_future_versions() {
        let dir = TempDir::new().expect("temp dir");
        let path = artefact_path(&dir, "future.bin");
        let mut bytes = Vec::new();
        benchmark_bincode_options()
            .serialize_into(
                &mut bytes,
                &Header {
                    magic: BENCHMARK_MAGIC,
                    version: 9,
                },
            )
            .expect("encode header");
        std::fs::write(&path, bytes).expect("write bytes");
        let err = read_benchmark_file(&path).expect_err("bad version");
        assert!(matches!(
            err,
            ArtefactError::UnsupportedVersion { found: 9, supported: 1 }
        ));
    }

    #[rstest]
    fn missing_file_reports_open_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = artefact_path(&dir, "absent.bin");
        assert!(matches!(
            read_benchmark_file(&path),
            Err(ArtefactError::Open { .. })
        ));
    }
}
