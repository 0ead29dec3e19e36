//! Shared wiring for the scorer behaviour tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tandem_core::test_support::fixed_time;
use tandem_core::{
    MemoryHistoryStore, MemoryOutcomeStore, MemoryProfiles, MemoryWeightOverrides,
};
use tandem_scorer::{FeedbackLoop, MatchEngine, ScoringConfig, ScoringContext};

/// Engine over in-memory collaborators.
pub type Engine =
    MatchEngine<Arc<MemoryProfiles>, Arc<MemoryWeightOverrides>, Arc<MemoryHistoryStore>>;

/// One engine, its feedback loop and handles on every collaborator.
pub struct World {
    pub profiles: Arc<MemoryProfiles>,
    pub overrides: Arc<MemoryWeightOverrides>,
    pub history: Arc<MemoryHistoryStore>,
    pub engine: Engine,
    pub feedback: FeedbackLoop<Arc<MemoryOutcomeStore>>,
}

impl World {
    /// Fresh state under `config`.
    pub fn new(config: ScoringConfig) -> Self {
        Self::sharing(
            config,
            Arc::new(MemoryProfiles::default()),
            Arc::new(MemoryHistoryStore::default()),
        )
    }

    /// Fresh scoring state over existing profiles and match history, as a
    /// second process pointed at the same stores would see them.
    pub fn sharing(
        config: ScoringConfig,
        profiles: Arc<MemoryProfiles>,
        history: Arc<MemoryHistoryStore>,
    ) -> Self {
        let context = Arc::new(
            ScoringContext::new(config).unwrap_or_else(|err| panic!("scoring context: {err}")),
        );
        let overrides = Arc::new(MemoryWeightOverrides::default());
        let engine = MatchEngine::new(
            Arc::clone(&profiles),
            Arc::clone(&overrides),
            Arc::clone(&history),
            Arc::clone(&context),
        );
        let feedback = FeedbackLoop::new(Arc::new(MemoryOutcomeStore::default()), context);
        Self {
            profiles,
            overrides,
            history,
            engine,
            feedback,
        }
    }
}

/// [`fixed_time`] shifted by `minutes`.
pub fn minutes_after_start(minutes: i64) -> DateTime<Utc> {
    fixed_time() + Duration::minutes(minutes)
}
