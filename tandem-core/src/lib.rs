//! Core domain types for the Tandem matching engine.
//!
//! The crate defines the vocabulary shared by every other Tandem crate:
//! participant [`Profile`]s, the fixed [`Factor`] vocabulary and its
//! [`FactorSet`] scores, [`WeightVector`]s, niche/tier [`Benchmark`]s,
//! recorded [`CollaborationOutcome`]s and the immutable [`MatchResult`].
//!
//! It also declares the collaborator traits the engine reads from and writes
//! to (see [`store`]). Durable storage is delegated to implementers; the crate
//! ships in-memory implementations and, behind the `store-sqlite` feature, a
//! SQLite-backed history and outcome store.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod benchmark;
pub mod factor;
pub mod outcome;
pub mod profile;
pub mod result;
pub mod store;
pub mod weights;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use benchmark::{Benchmark, BenchmarkVersion, EngagementBands, RateBand};
pub use factor::{Factor, FactorSet, NEUTRAL_SCORE, UnknownFactor};
pub use outcome::{
    CollaborationOutcome, CollaborationStats, CompletionStatus, OutcomeValidationError,
};
pub use profile::{AudienceBand, PriceRange, Profile, ProfileId, Role, Segment, Tier};
pub use result::{
    CacheStamp, Comparison, HistoryFilter, InputDigest, LOW_CONFIDENCE_THRESHOLD,
    MatchHistoryEntry, MatchResult, MatchTier, RankedMatch,
};
pub use store::{
    MatchHistoryStore, MemoryHistoryStore, MemoryOutcomeStore, MemoryProfiles,
    MemoryWeightOverrides, OutcomeStore, ProfileSource, StoreError, WeightOverrides,
};
#[cfg(feature = "store-sqlite")]
pub use store::SqliteMatchStore;
pub use weights::{WeightOverride, WeightSource, WeightVector, WeightVectorError, WeightVersion};
