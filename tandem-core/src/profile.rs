//! Participant profiles supplied by the profile collaborator.
//!
//! The engine only reads profiles. Every scoring attribute is optional so
//! incomplete profiles can still be scored; calculators substitute neutral
//! values for whatever is missing.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a creator or organisation profile.
///
/// # Examples
/// ```
/// use tandem_core::ProfileId;
///
/// let id = ProfileId::new("creator-1");
/// assert_eq!(id.as_str(), "creator-1");
/// assert_eq!(id.to_string(), "creator-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProfileId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Which side of a collaboration a profile represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// A content creator offering sponsored content.
    Creator,
    /// A company or brand looking for collaborations.
    Organization,
}

/// Inclusive price range, used both for budgets and creator rates.
///
/// # Examples
/// ```
/// use tandem_core::PriceRange;
///
/// let budget = PriceRange::new(5_000.0, 1_000.0);
/// assert_eq!(budget.min, 1_000.0);
/// assert!(budget.contains(&PriceRange::point(3_000.0)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl PriceRange {
    /// Build a range, swapping the bounds when given in reverse order.
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    /// A single price expressed as a zero-width range.
    pub fn point(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Return the range with ordered bounds, or `None` when a bound is not a
    /// finite, non-negative number.
    pub fn normalised(self) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        (valid(self.min) && valid(self.max)).then(|| Self::new(self.min, self.max))
    }

    /// Width of the range.
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Whether `other` lies entirely inside this range.
    pub fn contains(&self, other: &Self) -> bool {
        self.min <= other.min && other.max <= self.max
    }

    /// Length of the intersection, zero when the ranges are disjoint.
    pub fn overlap(&self, other: &Self) -> f64 {
        (self.max.min(other.max) - self.min.max(other.min)).max(0.0)
    }

    /// Distance between the ranges, zero when they intersect.
    pub fn gap(&self, other: &Self) -> f64 {
        (other.min - self.max).max(self.min - other.max).max(0.0)
    }
}

/// Audience size band an organisation is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceBand {
    /// Smallest acceptable audience.
    pub min: u64,
    /// Largest acceptable audience.
    pub max: u64,
}

impl AudienceBand {
    /// Build a band, swapping the bounds when given in reverse order.
    pub fn new(a: u64, b: u64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Whether `size` falls inside the band.
    pub fn contains(&self, size: u64) -> bool {
        (self.min..=self.max).contains(&size)
    }
}

/// Creator size tier derived from audience size.
///
/// # Examples
/// ```
/// use tandem_core::Tier;
///
/// assert_eq!(Tier::from_audience(9_999), Tier::Nano);
/// assert_eq!(Tier::from_audience(10_000), Tier::Micro);
/// assert_eq!(Tier::from_audience(2_000_000), Tier::Mega);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    /// Fewer than 10k followers.
    Nano,
    /// 10k to 100k followers.
    Micro,
    /// 100k to 500k followers.
    Mid,
    /// 500k to 1M followers.
    Macro,
    /// 1M followers or more.
    Mega,
}

impl Tier {
    /// Classify an audience size.
    pub const fn from_audience(size: u64) -> Self {
        match size {
            0..10_000 => Self::Nano,
            10_000..100_000 => Self::Micro,
            100_000..500_000 => Self::Mid,
            500_000..1_000_000 => Self::Macro,
            _ => Self::Mega,
        }
    }

    /// Return the tier as a lowercase `&str`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nano => "nano",
            Self::Micro => "micro",
            Self::Mid => "mid",
            Self::Macro => "macro",
            Self::Mega => "mega",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nano" => Ok(Self::Nano),
            "micro" => Ok(Self::Micro),
            "mid" => Ok(Self::Mid),
            "macro" => Ok(Self::Macro),
            "mega" => Ok(Self::Mega),
            _ => Err(format!("unknown tier '{s}'")),
        }
    }
}

/// Benchmark and history partition: a creator niche at a given tier.
///
/// Niches are compared case-insensitively, so the constructor folds case and
/// trims whitespace.
///
/// # Examples
/// ```
/// use tandem_core::{Segment, Tier};
///
/// let segment = Segment::new(" Fitness ", Tier::Micro);
/// assert_eq!(segment.niche(), "fitness");
/// assert_eq!(segment.to_string(), "fitness/micro");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Segment {
    niche: String,
    tier: Tier,
}

impl Segment {
    /// Build a segment from a raw niche label.
    pub fn new(niche: &str, tier: Tier) -> Self {
        Self {
            niche: normalise_label(niche),
            tier,
        }
    }

    /// The normalised niche label.
    pub fn niche(&self) -> &str {
        &self.niche
    }

    /// The creator tier.
    pub const fn tier(&self) -> Tier {
        self.tier
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.niche, self.tier)
    }
}

/// Fold a free-form label for comparison.
pub fn normalise_label(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Scoring-relevant view of a participant.
///
/// Organisations describe what they look for through `budget`,
/// `desired_audience` and `platforms`; creators through `rate`,
/// `audience_size`, `engagement_rate` and `platforms`. `niche` holds the
/// creator niche or the organisation's industry.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use tandem_core::{Profile, Role, Segment, Tier};
///
/// let updated = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let creator = Profile::new("c1", Role::Creator, updated)
///     .with_niche("Fitness")
///     .with_audience_size(25_000);
/// assert_eq!(creator.segment(), Some(Segment::new("fitness", Tier::Micro)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Profile identifier.
    pub id: ProfileId,
    /// Side of the marketplace.
    pub role: Role,
    /// Creator niche or organisation industry.
    #[serde(default)]
    pub niche: Option<String>,
    /// Organisation campaign budget.
    #[serde(default)]
    pub budget: Option<PriceRange>,
    /// Creator's explicitly stated rate.
    #[serde(default)]
    pub rate: Option<PriceRange>,
    /// Platforms the participant is active on or targets.
    #[serde(default)]
    pub platforms: BTreeSet<String>,
    /// Creator audience size.
    #[serde(default)]
    pub audience_size: Option<u64>,
    /// Audience band an organisation is looking for.
    #[serde(default)]
    pub desired_audience: Option<AudienceBand>,
    /// Creator engagement rate, in percent.
    #[serde(default)]
    pub engagement_rate: Option<f64>,
    /// Free-form location.
    #[serde(default)]
    pub location: Option<String>,
    /// Content formats produced or requested.
    #[serde(default)]
    pub content_types: Vec<String>,
    /// Last material modification, used for cache staleness.
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Construct a profile with no scoring attributes.
    pub fn new(id: impl Into<ProfileId>, role: Role, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            role,
            niche: None,
            budget: None,
            rate: None,
            platforms: BTreeSet::new(),
            audience_size: None,
            desired_audience: None,
            engagement_rate: None,
            location: None,
            content_types: Vec::new(),
            updated_at,
        }
    }

    /// Set the niche or industry.
    #[must_use]
    pub fn with_niche(mut self, niche: impl Into<String>) -> Self {
        self.niche = Some(niche.into());
        self
    }

    /// Set the organisation budget.
    #[must_use]
    pub fn with_budget(mut self, budget: PriceRange) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Set the creator's explicit rate.
    #[must_use]
    pub fn with_rate(mut self, rate: PriceRange) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Replace the platform set.
    #[must_use]
    pub fn with_platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platforms = platforms.into_iter().map(Into::into).collect();
        self
    }

    /// Set the creator audience size.
    #[must_use]
    pub fn with_audience_size(mut self, size: u64) -> Self {
        self.audience_size = Some(size);
        self
    }

    /// Set the audience band an organisation is looking for.
    #[must_use]
    pub fn with_desired_audience(mut self, band: AudienceBand) -> Self {
        self.desired_audience = Some(band);
        self
    }

    /// Set the creator engagement rate (percent).
    #[must_use]
    pub fn with_engagement_rate(mut self, rate: f64) -> Self {
        self.engagement_rate = Some(rate);
        self
    }

    /// Set the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Tier derived from the audience size, if known.
    pub fn tier(&self) -> Option<Tier> {
        self.audience_size.map(Tier::from_audience)
    }

    /// Niche with blank values treated as missing.
    pub fn niche_label(&self) -> Option<&str> {
        self.niche
            .as_deref()
            .map(str::trim)
            .filter(|niche| !niche.is_empty())
    }

    /// Benchmark segment, available when both niche and audience are known.
    pub fn segment(&self) -> Option<Segment> {
        let niche = self.niche_label()?;
        let tier = self.tier()?;
        Some(Segment::new(niche, tier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixed_time;
    use rstest::rstest;

    #[rstest]
    #[case(0, Tier::Nano)]
    #[case(99_999, Tier::Micro)]
    #[case(100_000, Tier::Mid)]
    #[case(999_999, Tier::Macro)]
    #[case(1_000_000, Tier::Mega)]
    fn tiers_follow_audience_thresholds(#[case] size: u64, #[case] expected: Tier) {
        assert_eq!(Tier::from_audience(size), expected);
    }

    #[rstest]
    fn tier_parsing_round_trips_display() {
        for tier in [Tier::Nano, Tier::Micro, Tier::Mid, Tier::Macro, Tier::Mega] {
            assert_eq!(tier.to_string().parse::<Tier>(), Ok(tier));
        }
        assert!("huge".parse::<Tier>().is_err());
    }

    #[rstest]
    fn price_ranges_measure_overlap_and_gap() {
        let budget = PriceRange::new(1_000.0, 5_000.0);
        let partial = PriceRange::new(4_000.0, 6_000.0);
        let disjoint = PriceRange::new(7_000.0, 9_000.0);

        assert_eq!(budget.overlap(&partial), 1_000.0);
        assert_eq!(budget.gap(&partial), 0.0);
        assert_eq!(budget.overlap(&disjoint), 0.0);
        assert_eq!(budget.gap(&disjoint), 2_000.0);
        assert_eq!(disjoint.gap(&budget), 2_000.0);
    }

    #[rstest]
    fn normalising_rejects_negative_prices() {
        assert!(PriceRange { min: -1.0, max: 3.0 }.normalised().is_none());
        assert!(PriceRange { min: f64::NAN, max: 3.0 }.normalised().is_none());
        let swapped = PriceRange { min: 9.0, max: 3.0 }.normalised();
        assert_eq!(swapped, Some(PriceRange::new(3.0, 9.0)));
    }

    #[rstest]
    fn blank_niche_has_no_segment() {
        let profile = Profile::new("c", Role::Creator, fixed_time())
            .with_niche("   ")
            .with_audience_size(5_000);
        assert!(profile.segment().is_none());
    }

    #[rstest]
    fn profiles_deserialise_with_missing_attributes() {
        let json = r#"{"id":"org-1","role":"organization","updatedAt":"2024-01-01T00:00:00Z"}"#;
        let profile: Profile = serde_json::from_str(json).expect("profile should parse");
        assert_eq!(profile.id, ProfileId::new("org-1"));
        assert_eq!(profile.role, Role::Organization);
        assert!(profile.platforms.is_empty());
        assert!(profile.budget.is_none());
    }
}
