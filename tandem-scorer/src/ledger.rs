//! Per-segment outcome ledger feeding the historical factors.
//!
//! Writers touching different segments never contend; writers on the same
//! segment serialise on that segment's shard only. Every append bumps the
//! segment's generation, which is part of each cached result's stamp, so
//! results whose historical factors may have changed are recomputed lazily.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tandem_core::{CollaborationOutcome, Segment};

/// Outcome summary retained for historical scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerEntry {
    /// When the outcome was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Arrival order, breaking ties between equal timestamps.
    pub sequence: u64,
    /// Success rating, 1 to 5.
    pub rating: u8,
    /// Repeat-collaboration signal in `0..=1`.
    pub brand_signal: f64,
}

#[derive(Debug, Default)]
struct SegmentLedger {
    entries: Vec<LedgerEntry>,
    generation: u64,
}

/// Outcome summaries grouped by segment.
#[derive(Debug)]
pub struct OutcomeLedger {
    segments: DashMap<Segment, SegmentLedger>,
    sequence: AtomicU64,
    window: usize,
}

impl OutcomeLedger {
    /// Create an empty ledger retaining `window` outcomes per segment.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            segments: DashMap::new(),
            sequence: AtomicU64::new(0),
            window: window.max(1),
        }
    }

    /// Record an outcome under its segment.
    ///
    /// Returns the segment's new generation, or `None` when the outcome has
    /// no segment. Entries are kept ordered by recording time regardless of
    /// arrival order.
    #[must_use]
    pub fn record(&self, outcome: &CollaborationOutcome) -> Option<u64> {
        let segment = outcome.segment.clone()?;
        let entry = LedgerEntry {
            recorded_at: outcome.recorded_at,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            rating: outcome.success_rating,
            brand_signal: outcome.brand_signal(),
        };
        let mut ledger = self.segments.entry(segment).or_default();
        let position = ledger
            .entries
            .partition_point(|e| (e.recorded_at, e.sequence) <= (entry.recorded_at, entry.sequence));
        ledger.entries.insert(position, entry);
        let excess = ledger.entries.len().saturating_sub(self.window);
        if excess > 0 {
            ledger.entries.drain(..excess);
        }
        ledger.generation = ledger.generation.saturating_add(1);
        Some(ledger.generation)
    }

    /// Generation of `segment`; zero when nothing was recorded.
    #[must_use]
    pub fn generation(&self, segment: Option<&Segment>) -> u64 {
        segment
            .and_then(|s| self.segments.get(s))
            .map_or(0, |ledger| ledger.generation)
    }

    /// Retained entries for `segment`, newest first.
    #[must_use]
    pub fn recent(&self, segment: Option<&Segment>) -> Vec<LedgerEntry> {
        segment
            .and_then(|s| self.segments.get(s))
            .map(|ledger| ledger.entries.iter().rev().copied().collect())
            .unwrap_or_default()
    }

    /// Drop every entry.
    ///
    /// Generations are preserved and advanced so cached results computed
    /// against the cleared entries become stale.
    pub fn reset(&self) {
        for mut ledger in self.segments.iter_mut() {
            ledger.entries.clear();
            ledger.generation = ledger.generation.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;
    use tandem_core::test_support::{fitness_micro, fixed_time, outcome};

    #[rstest]
    fn entries_are_newest_first_by_recording_time() {
        let ledger = OutcomeLedger::new(10);
        let mut late = outcome("late", 1);
        late.recorded_at = fixed_time() + Duration::hours(2);
        let early = outcome("early", 5);

        assert!(ledger.record(&late).is_some());
        assert!(ledger.record(&early).is_some());

        let ratings: Vec<u8> = ledger
            .recent(Some(&fitness_micro()))
            .iter()
            .map(|e| e.rating)
            .collect();
        assert_eq!(ratings, [1, 5]);
    }

    #[rstest]
    fn generation_advances_per_outcome() {
        let ledger = OutcomeLedger::new(10);
        assert_eq!(ledger.generation(Some(&fitness_micro())), 0);
        assert_eq!(ledger.record(&outcome("a", 4)), Some(1));
        assert_eq!(ledger.record(&outcome("b", 4)), Some(2));
        assert_eq!(ledger.generation(Some(&fitness_micro())), 2);
        assert_eq!(ledger.generation(None), 0);
    }

    #[rstest]
    fn outcomes_without_segment_are_ignored() {
        let ledger = OutcomeLedger::new(10);
        let mut orphan = outcome("a", 4);
        orphan.segment = None;
        assert_eq!(ledger.record(&orphan), None);
    }

    #[rstest]
    fn window_keeps_the_newest_outcomes() {
        let ledger = OutcomeLedger::new(2);
        for rating in [1_u8, 2, 3] {
            let mut o = outcome("c", rating);
            o.recorded_at = fixed_time() + Duration::minutes(i64::from(rating));
            assert!(ledger.record(&o).is_some());
        }
        let ratings: Vec<u8> = ledger
            .recent(Some(&fitness_micro()))
            .iter()
            .map(|e| e.rating)
            .collect();
        assert_eq!(ratings, [3, 2]);
    }

    #[rstest]
    fn reset_clears_entries_and_advances_generation() {
        let ledger = OutcomeLedger::new(10);
        assert_eq!(ledger.record(&outcome("a", 4)), Some(1));
        ledger.reset();
        assert!(ledger.recent(Some(&fitness_micro())).is_empty());
        assert_eq!(ledger.generation(Some(&fitness_micro())), 2);
    }
}
