//! Error types raised by the matching engine.

use camino::Utf8PathBuf;
use tandem_core::{OutcomeValidationError, ProfileId, StoreError, WeightVectorError};
use thiserror::Error;

/// Errors returned by scoring requests.
///
/// Sparse data, invalid weight overrides, missing benchmarks and concurrent
/// recomputation are all recovered internally. The only condition a scoring
/// request rejects is an identifier that does not resolve to a profile.
#[derive(Debug, Error)]
pub enum MatchError {
    /// A subject or candidate id did not resolve to a profile.
    #[error("unknown {role} profile '{id}'")]
    UnknownProfile {
        /// Which side of the request was unknown.
        role: &'static str,
        /// The id that failed to resolve.
        id: ProfileId,
    },
    /// Reading match history for a query failed.
    #[error("failed to read match history")]
    History {
        /// Source error from the history store.
        #[source]
        source: StoreError,
    },
}

/// Errors raised while ingesting outcomes or recalculating aggregates.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The outcome failed validation and was not recorded.
    #[error("rejected outcome for connection '{connection_id}'")]
    Invalid {
        /// Connection the outcome referred to.
        connection_id: String,
        /// The violated invariant.
        #[source]
        source: OutcomeValidationError,
    },
    /// The outcome store could not be read or written.
    #[error("outcome store failure")]
    Store {
        /// Source error from the outcome store.
        #[source]
        source: StoreError,
    },
}

/// Errors raised when scoring configuration is unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value is outside its accepted range.
    #[error("invalid scoring configuration: {field} {reason}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// Constraint that was violated.
        reason: &'static str,
    },
    /// The default weight vector could not be built.
    #[error("invalid default weights")]
    Weights {
        /// Source error from weight normalisation.
        #[source]
        source: WeightVectorError,
    },
}

/// Errors raised while reading or writing benchmark artefacts.
#[derive(Debug, Error)]
pub enum ArtefactError {
    /// Opening the artefact failed.
    #[error("failed to open benchmark artefact at {path}")]
    Open {
        /// Requested artefact path.
        path: Utf8PathBuf,
        /// Source error from std I/O.
        #[source]
        source: std::io::Error,
    },
    /// Reading the artefact bytes failed.
    #[error("failed to read benchmark artefact at {path}")]
    Read {
        /// Requested artefact path.
        path: Utf8PathBuf,
        /// Source error from std I/O.
        #[source]
        source: std::io::Error,
    },
    /// The artefact could not be decoded.
    #[error("failed to decode benchmark artefact at {path}")]
    Decode {
        /// Requested artefact path.
        path: Utf8PathBuf,
        /// Decoder error from `bincode`.
        #[source]
        source: bincode::Error,
    },
    /// The artefact did not start with the expected magic bytes.
    #[error("invalid benchmark artefact magic: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Expected byte sequence.
        expected: [u8; 4],
        /// Sequence read from the file.
        found: [u8; 4],
    },
    /// The artefact used an unsupported format version.
    #[error("unsupported benchmark artefact version {found}; supported version is {supported}")]
    UnsupportedVersion {
        /// Version present in the header.
        found: u16,
        /// Version written by this build.
        supported: u16,
    },
    /// Creating the parent directory for the artefact failed.
    #[error("failed to create parent directory {path}")]
    CreateParent {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Source error from std I/O.
        #[source]
        source: std::io::Error,
    },
    /// Writing the artefact failed.
    #[error("failed to write benchmark artefact at {path}")]
    Write {
        /// Target artefact path.
        path: Utf8PathBuf,
        /// Source error from std I/O.
        #[source]
        source: std::io::Error,
    },
    /// Encoding the snapshot failed.
    #[error("failed to serialise benchmarks into {path}")]
    Serialise {
        /// Target artefact path.
        path: Utf8PathBuf,
        /// Encoder error from `bincode`.
        #[source]
        source: bincode::Error,
    },
}
