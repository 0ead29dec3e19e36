//! Process-wide scoring state with an explicit lifecycle.

use crate::benchmark::BenchmarkStore;
use crate::ledger::OutcomeLedger;
use crate::weights::DefaultWeights;
use crate::{ConfigError, ScoringConfig};

/// Shared state read by scoring and written by the feedback loop.
///
/// Create one at process start and share it behind an `Arc` between the
/// [`MatchEngine`](crate::MatchEngine) and the
/// [`FeedbackLoop`](crate::FeedbackLoop).
///
/// # Examples
/// ```
/// use tandem_scorer::{ScoringConfig, ScoringContext};
///
/// let context = ScoringContext::new(ScoringConfig::default()).unwrap();
/// assert_eq!(context.defaults().current().factors().count(), 7);
/// ```
#[derive(Debug)]
pub struct ScoringContext {
    config: ScoringConfig,
    benchmarks: BenchmarkStore,
    ledger: OutcomeLedger,
    defaults: DefaultWeights,
}

impl ScoringContext {
    /// Validate `config` and build empty state from it.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the configuration is unusable.
    pub fn new(config: ScoringConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            benchmarks: BenchmarkStore::new(&config),
            ledger: OutcomeLedger::new(config.history_window),
            defaults: DefaultWeights::new(config.vocabulary())?,
            config,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Segment benchmarks.
    #[must_use]
    pub const fn benchmarks(&self) -> &BenchmarkStore {
        &self.benchmarks
    }

    /// Outcome ledger behind the historical factors.
    #[must_use]
    pub const fn ledger(&self) -> &OutcomeLedger {
        &self.ledger
    }

    /// System default weights.
    #[must_use]
    pub const fn defaults(&self) -> &DefaultWeights {
        &self.defaults
    }

    /// Clear benchmarks, ledger and default weights.
    ///
    /// Every version advances, so results cached before the reset are
    /// recomputed on their next read.
    pub fn reset(&self) {
        self.benchmarks.reset();
        self.ledger.reset();
        self.defaults.reset();
    }
}
