//! In-memory collaborator implementations.
//!
//! These back tests, the CLI and single-process deployments. Each store has
//! an explicit `clear` so test suites can tear state down between cases.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use super::{MatchHistoryStore, OutcomeStore, ProfileSource, StoreError, WeightOverrides};
use crate::{
    CollaborationOutcome, Factor, HistoryFilter, MatchHistoryEntry, Profile, ProfileId,
    WeightOverride,
};

/// Profiles held in a map keyed by id.
#[derive(Debug, Default)]
pub struct MemoryProfiles {
    profiles: RwLock<HashMap<ProfileId, Profile>>,
}

impl MemoryProfiles {
    /// Build a store from a collection of profiles.
    pub fn with_profiles<I>(profiles: I) -> Self
    where
        I: IntoIterator<Item = Profile>,
    {
        Self {
            profiles: RwLock::new(profiles.into_iter().map(|p| (p.id.clone(), p)).collect()),
        }
    }

    /// Insert or replace a profile.
    pub fn upsert(&self, profile: Profile) {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile.id.clone(), profile);
    }

    /// Number of stored profiles.
    pub fn len(&self) -> usize {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every profile.
    pub fn clear(&self) {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ProfileSource for MemoryProfiles {
    fn profile(&self, id: &ProfileId) -> Option<Profile> {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

#[derive(Debug, Default)]
struct OverrideTable {
    current: HashMap<ProfileId, WeightOverride>,
    /// Last revision issued per user, kept after removal.
    revisions: HashMap<ProfileId, u64>,
}

/// Weight overrides keyed by user.
#[derive(Debug, Default)]
pub struct MemoryWeightOverrides {
    table: RwLock<OverrideTable>,
}

impl MemoryWeightOverrides {
    /// Store `weights` as the user's override and return its new revision.
    ///
    /// Revisions increase by one on every edit, removals included, so a
    /// revision is never reused for different weights.
    pub fn set(&self, user: ProfileId, weights: BTreeMap<Factor, f64>) -> u64 {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let revision = table
            .revisions
            .get(&user)
            .map_or(1, |last| last.saturating_add(1));
        table.revisions.insert(user.clone(), revision);
        table.current.insert(
            user.clone(),
            WeightOverride {
                user_id: user,
                weights,
                revision,
            },
        );
        revision
    }

    /// Store an override exactly as exported, keeping its revision.
    ///
    /// Later [`MemoryWeightOverrides::set`] calls continue from the larger of
    /// the stored and the inserted revision.
    pub fn insert(&self, weights: WeightOverride) {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let last = table.revisions.entry(weights.user_id.clone()).or_default();
        *last = (*last).max(weights.revision);
        table.current.insert(weights.user_id.clone(), weights);
    }

    /// Delete the user's override, returning it if one existed.
    pub fn remove(&self, user: &ProfileId) -> Option<WeightOverride> {
        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .remove(user)
    }

    /// Remove every override and forget issued revisions.
    pub fn clear(&self) {
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = OverrideTable::default();
    }
}

impl WeightOverrides for MemoryWeightOverrides {
    fn weight_override(&self, user: &ProfileId) -> Option<WeightOverride> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .get(user)
            .cloned()
    }
}

/// Append-only match history held in insertion order.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    entries: RwLock<Vec<MatchHistoryEntry>>,
}

impl MemoryHistoryStore {
    /// Number of stored entries, superseded ones included.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl MatchHistoryStore for MemoryHistoryStore {
    fn latest(
        &self,
        subject: &ProfileId,
        candidate: &ProfileId,
    ) -> Result<Option<MatchHistoryEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned {
            store: "match history",
        })?;
        Ok(entries
            .iter()
            .rev()
            .find(|e| &e.result.subject_id == subject && &e.result.candidate_id == candidate)
            .cloned())
    }

    fn append(&self, entry: &MatchHistoryEntry) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError::Poisoned {
                store: "match history",
            })?
            .push(entry.clone());
        Ok(())
    }

    fn history(
        &self,
        subject: &ProfileId,
        filter: &HistoryFilter,
    ) -> Result<Vec<MatchHistoryEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned {
            store: "match history",
        })?;
        let mut matching: Vec<_> = entries
            .iter()
            .filter(|e| &e.result.subject_id == subject)
            .cloned()
            .collect();
        // Stable sort keeps later appends ahead of earlier ones at equal times.
        matching.reverse();
        matching.sort_by(|a, b| b.result.computed_at.cmp(&a.result.computed_at));
        Ok(filter.apply(matching))
    }
}

/// Append-only outcome log held in insertion order.
#[derive(Debug, Default)]
pub struct MemoryOutcomeStore {
    outcomes: RwLock<Vec<CollaborationOutcome>>,
}

impl MemoryOutcomeStore {
    /// Remove every outcome.
    pub fn clear(&self) {
        self.outcomes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl OutcomeStore for MemoryOutcomeStore {
    fn append_outcome(&self, outcome: &CollaborationOutcome) -> Result<(), StoreError> {
        self.outcomes
            .write()
            .map_err(|_| StoreError::Poisoned { store: "outcomes" })?
            .push(outcome.clone());
        Ok(())
    }

    fn outcomes(&self) -> Result<Vec<CollaborationOutcome>, StoreError> {
        self.outcomes
            .read()
            .map(|outcomes| outcomes.clone())
            .map_err(|_| StoreError::Poisoned { store: "outcomes" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{creator, history_entry, outcome};
    use rstest::rstest;

    #[rstest]
    fn profiles_are_replaced_on_upsert() {
        let store = MemoryProfiles::with_profiles([creator("c1")]);
        let updated = creator("c1").with_engagement_rate(9.0);
        store.upsert(updated.clone());
        assert_eq!(store.profile(&ProfileId::new("c1")), Some(updated));
        assert_eq!(store.len(), 1);
        store.clear();
        assert!(store.is_empty());
    }

    #[rstest]
    fn override_revisions_increase_per_edit() {
        let store = MemoryWeightOverrides::default();
        let user = ProfileId::new("u1");
        let weights = BTreeMap::from([(Factor::BudgetAlignment, 1.0)]);
        assert_eq!(store.set(user.clone(), weights.clone()), 1);
        assert_eq!(store.set(user.clone(), weights), 2);
        assert_eq!(store.weight_override(&user).map(|o| o.revision), Some(2));
        assert!(store.remove(&user).is_some());
        assert!(store.weight_override(&user).is_none());
    }

    #[rstest]
    fn revisions_are_not_reused_after_removal() {
        let store = MemoryWeightOverrides::default();
        let user = ProfileId::new("u1");
        assert_eq!(
            store.set(user.clone(), BTreeMap::from([(Factor::NicheCompatibility, 1.0)])),
            1
        );
        assert!(store.remove(&user).is_some());
        assert_eq!(
            store.set(user.clone(), BTreeMap::from([(Factor::BudgetAlignment, 1.0)])),
            2
        );
    }

    #[rstest]
    fn inserted_overrides_keep_their_revision() {
        let store = MemoryWeightOverrides::default();
        let user = ProfileId::new("u1");
        store.insert(WeightOverride {
            user_id: user.clone(),
            weights: BTreeMap::from([(Factor::AudienceMatch, 2.0)]),
            revision: 7,
        });
        assert_eq!(store.weight_override(&user).map(|o| o.revision), Some(7));
        assert_eq!(store.set(user, BTreeMap::new()), 8);
    }

    #[rstest]
    fn history_len_survives_a_poisoned_lock() {
        let store = MemoryHistoryStore::default();
        store
            .append(&history_entry("s", "c", 60, 0))
            .expect("append");
        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.entries.write().expect("lock");
            panic!("poison the history lock");
        }));
        assert!(poisoned.is_err());
        assert_eq!(store.len(), 1);
    }

    #[rstest]
    fn history_appends_instead_of_overwriting() {
        let store = MemoryHistoryStore::default();
        let first = history_entry("s", "c", 60, 0);
        let second = history_entry("s", "c", 70, 5);
        store.append(&first).expect("append first");
        store.append(&second).expect("append second");

        let latest = store
            .latest(&ProfileId::new("s"), &ProfileId::new("c"))
            .expect("read latest");
        assert_eq!(latest, Some(second));
        assert_eq!(store.len(), 2);
    }

    #[rstest]
    fn history_is_newest_first_and_filtered() {
        let store = MemoryHistoryStore::default();
        for (i, score) in [40_u8, 80, 90].into_iter().enumerate() {
            let offset = i64::try_from(i).expect("small index");
            store
                .append(&history_entry("s", "c", score, offset))
                .expect("append");
        }
        store
            .append(&history_entry("other", "c", 99, 10))
            .expect("append");

        let filter = HistoryFilter::default().with_min_score(50).with_limit(1);
        let found = store
            .history(&ProfileId::new("s"), &filter)
            .expect("query history");
        assert_eq!(found.len(), 1);
        assert_eq!(found.first().map(|e| e.result.score), Some(90));

        let since = found
            .first()
            .map(|e| e.result.computed_at)
            .expect("entry present");
        let recent = store
            .history(&ProfileId::new("s"), &HistoryFilter::default().with_since(since))
            .expect("query history");
        assert_eq!(recent.len(), 1);
    }

    #[rstest]
    fn outcomes_keep_insertion_order() {
        let store = MemoryOutcomeStore::default();
        store.append_outcome(&outcome("a", 5)).expect("append");
        store.append_outcome(&outcome("b", 1)).expect("append");
        let ids: Vec<_> = store
            .outcomes()
            .expect("read")
            .into_iter()
            .map(|o| o.connection_id)
            .collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
