//! Matching and scoring engine for Tandem.
//!
//! The crate turns a pair of [`Profile`](tandem_core::Profile)s into an
//! explained [`MatchResult`](tandem_core::MatchResult) and learns from the
//! collaborations that follow:
//! - **Benchmarks** ([`BenchmarkStore`]) hold per niche/tier statistics in
//!   versioned snapshots swapped atomically on recalculation.
//! - **Factor calculators** ([`factors`]) are pure functions scoring each
//!   compatibility dimension in `0..=100`, substituting the neutral midpoint
//!   for missing data.
//! - **Weights** ([`WeightResolver`], [`DefaultWeights`]) pick a user's
//!   override when valid and fall back to versioned system defaults.
//! - **Aggregation** ([`aggregate`]) folds factors and weights into a score,
//!   a confidence and reasoning.
//! - **The match engine** ([`MatchEngine`]) caches results against version
//!   stamps, coordinates concurrent recomputation and ranks batches.
//! - **The feedback loop** ([`FeedbackLoop`]) ingests outcomes, recalculates
//!   benchmarks and recalibrates default weights.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use tandem_core::test_support::{creator, organization};
//! use tandem_core::{MemoryHistoryStore, MemoryProfiles, MemoryWeightOverrides, ProfileId};
//! use tandem_scorer::{MatchEngine, ScoringConfig, ScoringContext};
//!
//! let context = Arc::new(ScoringContext::new(ScoringConfig::default()).unwrap());
//! let profiles = MemoryProfiles::with_profiles([organization("brand"), creator("alice")]);
//! let engine = MatchEngine::new(
//!     profiles,
//!     MemoryWeightOverrides::default(),
//!     MemoryHistoryStore::default(),
//!     context,
//! );
//! let result = engine
//!     .get_or_compute(&ProfileId::new("brand"), &ProfileId::new("alice"))
//!     .unwrap();
//! assert!(result.score <= 100);
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod aggregate;
mod artefact;
pub mod benchmark;
mod config;
mod context;
mod engine;
mod error;
pub mod factors;
mod feedback;
pub mod flight;
pub mod ledger;
mod weights;

pub use artefact::{
    BENCHMARK_FORMAT_VERSION, BENCHMARK_MAGIC, benchmark_bincode_options, read_benchmark_file,
    write_benchmark_file,
};
pub use benchmark::{BenchmarkSnapshot, BenchmarkStore, Observation};
pub use config::{RecalibrationConfig, ScoringConfig};
pub use context::ScoringContext;
pub use engine::MatchEngine;
pub use error::{ArtefactError, ConfigError, IngestError, MatchError};
pub use feedback::{FeedbackLoop, IngestReceipt, RecalculationReport, recalibrated_weights};
pub use weights::{DefaultWeights, ResolvedWeights, WeightResolver};
