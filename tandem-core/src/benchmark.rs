//! Per-segment statistical baselines.
//!
//! A [`Benchmark`] normalises raw creator attributes (rates, engagement)
//! into comparable positions within their niche and tier. Benchmarks are
//! produced by the scorer's benchmark store; this module only defines the
//! values and the lookups calculators perform on them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic version of a complete benchmark snapshot.
///
/// # Examples
/// ```
/// use tandem_core::BenchmarkVersion;
///
/// let v = BenchmarkVersion::default();
/// assert_eq!(v.next(), BenchmarkVersion(1));
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BenchmarkVersion(pub u64);

impl BenchmarkVersion {
    /// The version following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for BenchmarkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Typical creator rate range for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateBand {
    /// 25th percentile rate.
    pub low: f64,
    /// Median rate.
    pub median: f64,
    /// 75th percentile rate.
    pub high: f64,
}

/// Engagement rate percentiles for a segment, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngagementBands {
    /// 10th percentile.
    pub p10: f64,
    /// 25th percentile.
    pub p25: f64,
    /// Median.
    pub p50: f64,
    /// 75th percentile.
    pub p75: f64,
    /// 90th percentile.
    pub p90: f64,
}

impl Default for EngagementBands {
    fn default() -> Self {
        Self {
            p10: 1.0,
            p25: 2.0,
            p50: 3.0,
            p75: 5.0,
            p90: 8.0,
        }
    }
}

impl EngagementBands {
    /// Position of `rate` within the bands, on a `0..=100` scale.
    ///
    /// The bands are interpolated linearly. A rate of zero maps to 0 and a
    /// rate of twice the 90th percentile (or more) maps to 100.
    ///
    /// # Examples
    /// ```
    /// use tandem_core::EngagementBands;
    ///
    /// let bands = EngagementBands::default();
    /// assert_eq!(bands.percentile_of(3.0), 50.0);
    /// assert_eq!(bands.percentile_of(4.0), 62.5);
    /// assert_eq!(bands.percentile_of(20.0), 100.0);
    /// ```
    pub fn percentile_of(&self, rate: f64) -> f64 {
        if !rate.is_finite() || rate <= 0.0 {
            return 0.0;
        }
        let knots = [
            (self.p10, 10.0),
            (self.p25, 25.0),
            (self.p50, 50.0),
            (self.p75, 75.0),
            (self.p90, 90.0),
            (self.p90 * 2.0, 100.0),
        ];
        let mut previous = (0.0, 0.0);
        for (x, y) in knots {
            if rate <= x {
                let width = x - previous.0;
                if width <= 0.0 {
                    return y;
                }
                return previous.1 + (y - previous.1) * (rate - previous.0) / width;
            }
            previous = (x, y);
        }
        100.0
    }
}

/// Aggregate statistics for one niche/tier segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Benchmark {
    /// Creator rate band, absent when no observation reported a rate.
    pub rate_band: Option<RateBand>,
    /// Mean engagement rate, absent when no observation reported one.
    pub average_engagement: Option<f64>,
    /// Engagement percentiles.
    pub engagement: EngagementBands,
    /// Number of observations aggregated.
    pub sample_size: u32,
    /// Saturating confidence in `0..=1`.
    pub confidence: f64,
    /// When the aggregate was computed; `None` for the neutral benchmark.
    pub recalculated_at: Option<DateTime<Utc>>,
}

impl Benchmark {
    /// Conservative benchmark used when a segment has no data.
    pub fn neutral() -> Self {
        Self {
            rate_band: None,
            average_engagement: None,
            engagement: EngagementBands::default(),
            sample_size: 0,
            confidence: 0.0,
            recalculated_at: None,
        }
    }

    /// Saturating confidence for `sample_size` observations.
    ///
    /// # Examples
    /// ```
    /// use tandem_core::Benchmark;
    ///
    /// assert_eq!(Benchmark::confidence_for(15, 30), 0.5);
    /// assert_eq!(Benchmark::confidence_for(90, 30), 1.0);
    /// assert_eq!(Benchmark::confidence_for(5, 0), 1.0);
    /// ```
    pub fn confidence_for(sample_size: u32, min_sample_for_full_confidence: u32) -> f64 {
        if min_sample_for_full_confidence == 0 {
            return 1.0;
        }
        (f64::from(sample_size) / f64::from(min_sample_for_full_confidence)).min(1.0)
    }

    /// Whether this is the neutral fallback.
    pub fn is_neutral(&self) -> bool {
        self.sample_size == 0 && self.recalculated_at.is_none()
    }
}
