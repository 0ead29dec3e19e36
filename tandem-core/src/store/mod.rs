//! Collaborator traits the engine reads from and writes to.
//!
//! Profiles and weight overrides are owned by other parts of the system and
//! are only ever read. Match history and collaboration outcomes are written by
//! the engine but durable storage is delegated to implementers of
//! [`MatchHistoryStore`] and [`OutcomeStore`]. Both stores are append-only.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    CollaborationOutcome, HistoryFilter, MatchHistoryEntry, Profile, ProfileId, WeightOverride,
};

mod memory;
#[cfg(feature = "store-sqlite")]
mod sqlite;

pub use memory::{MemoryHistoryStore, MemoryOutcomeStore, MemoryProfiles, MemoryWeightOverrides};
#[cfg(feature = "store-sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "store-sqlite")))]
pub use sqlite::SqliteMatchStore;

/// Errors raised by history and outcome stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A writer panicked while holding the store lock.
    #[error("{store} lock poisoned")]
    Poisoned {
        /// Name of the affected store.
        store: &'static str,
    },
    /// A record could not be encoded or decoded.
    #[error("failed to encode {what}: {source}")]
    Encode {
        /// Record kind.
        what: &'static str,
        /// JSON codec failure.
        #[source]
        source: serde_json::Error,
    },
    /// The SQLite backend failed.
    #[cfg(feature = "store-sqlite")]
    #[error("sqlite {operation} failed: {source}")]
    Sqlite {
        /// Operation being performed.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
}

/// Read-only source of participant profiles.
pub trait ProfileSource: Send + Sync {
    /// Look up a profile by id.
    fn profile(&self, id: &ProfileId) -> Option<Profile>;
}

/// Read-only source of per-user weight overrides.
pub trait WeightOverrides: Send + Sync {
    /// Current override for `user`, if the user has created one.
    fn weight_override(&self, user: &ProfileId) -> Option<WeightOverride>;
}

/// Append-only persistence for computed match results.
pub trait MatchHistoryStore: Send + Sync {
    /// Most recently appended entry for the pair.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the backend cannot be read.
    fn latest(
        &self,
        subject: &ProfileId,
        candidate: &ProfileId,
    ) -> Result<Option<MatchHistoryEntry>, StoreError>;

    /// Persist a new entry. Existing entries are never overwritten.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the backend cannot be written.
    fn append(&self, entry: &MatchHistoryEntry) -> Result<(), StoreError>;

    /// Entries for `subject`, newest first, restricted by `filter`.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the backend cannot be read.
    fn history(
        &self,
        subject: &ProfileId,
        filter: &HistoryFilter,
    ) -> Result<Vec<MatchHistoryEntry>, StoreError>;
}

/// Append-only persistence for collaboration outcomes.
pub trait OutcomeStore: Send + Sync {
    /// Persist an outcome.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the backend cannot be written.
    fn append_outcome(&self, outcome: &CollaborationOutcome) -> Result<(), StoreError>;

    /// Every stored outcome in insertion order.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the backend cannot be read.
    fn outcomes(&self) -> Result<Vec<CollaborationOutcome>, StoreError>;
}

impl<T: ProfileSource + ?Sized> ProfileSource for Arc<T> {
    fn profile(&self, id: &ProfileId) -> Option<Profile> {
        (**self).profile(id)
    }
}

impl<T: WeightOverrides + ?Sized> WeightOverrides for Arc<T> {
    fn weight_override(&self, user: &ProfileId) -> Option<WeightOverride> {
        (**self).weight_override(user)
    }
}

impl<T: MatchHistoryStore + ?Sized> MatchHistoryStore for Arc<T> {
    fn latest(
        &self,
        subject: &ProfileId,
        candidate: &ProfileId,
    ) -> Result<Option<MatchHistoryEntry>, StoreError> {
        (**self).latest(subject, candidate)
    }

    fn append(&self, entry: &MatchHistoryEntry) -> Result<(), StoreError> {
        (**self).append(entry)
    }

    fn history(
        &self,
        subject: &ProfileId,
        filter: &HistoryFilter,
    ) -> Result<Vec<MatchHistoryEntry>, StoreError> {
        (**self).history(subject, filter)
    }
}

impl<T: OutcomeStore + ?Sized> OutcomeStore for Arc<T> {
    fn append_outcome(&self, outcome: &CollaborationOutcome) -> Result<(), StoreError> {
        (**self).append_outcome(outcome)
    }

    fn outcomes(&self) -> Result<Vec<CollaborationOutcome>, StoreError> {
        (**self).outcomes()
    }
}
