//! Facade crate for the Tandem matching engine.
//!
//! This crate re-exports the core domain types and the scoring engine, and
//! exposes the SQLite-backed stores behind the `store-sqlite` feature.

#![forbid(unsafe_code)]

pub use tandem_core::{
    Benchmark, BenchmarkVersion, CollaborationOutcome, CollaborationStats, Comparison, Factor,
    FactorSet, HistoryFilter, MatchHistoryEntry, MatchHistoryStore, MatchResult, MatchTier,
    MemoryHistoryStore, MemoryOutcomeStore, MemoryProfiles, MemoryWeightOverrides, OutcomeStore,
    Profile, ProfileId, ProfileSource, RankedMatch, Role, Segment, StoreError, Tier,
    WeightOverride, WeightOverrides, WeightVector, WeightVersion,
};

#[cfg(feature = "store-sqlite")]
pub use tandem_core::SqliteMatchStore;

pub use tandem_scorer::{
    FeedbackLoop, IngestError, MatchEngine, MatchError, RecalculationReport, ScoringConfig,
    ScoringContext,
};
