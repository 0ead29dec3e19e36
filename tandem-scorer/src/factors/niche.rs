//! Niche compatibility via a fixed category taxonomy.

use std::collections::BTreeSet;

use tandem_core::profile::normalise_label;

use super::FactorScore;

/// Broad content categories niches and industries are grouped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    /// Fitness, sport and wellbeing.
    Fitness,
    /// Food and drink.
    Food,
    /// Clothing and accessories.
    Fashion,
    /// Cosmetics and personal care.
    Beauty,
    /// Consumer technology.
    Technology,
    /// Video games and esports.
    Gaming,
    /// Travel and hospitality.
    Travel,
    /// Home, family and general lifestyle.
    Lifestyle,
    /// Money, business and education.
    Finance,
}

const KEYWORDS: [(Category, &[&str]); 9] = [
    (
        Category::Fitness,
        &[
            "fitness", "health", "wellness", "sport", "sports", "yoga", "gym", "nutrition",
            "running",
        ],
    ),
    (
        Category::Food,
        &["food", "cooking", "recipes", "baking", "restaurant", "beverage", "drinks"],
    ),
    (
        Category::Fashion,
        &["fashion", "apparel", "clothing", "style", "jewelry", "accessories"],
    ),
    (
        Category::Beauty,
        &["beauty", "makeup", "skincare", "cosmetics", "haircare"],
    ),
    (
        Category::Technology,
        &["technology", "tech", "software", "electronics", "gadgets"],
    ),
    (
        Category::Gaming,
        &["gaming", "games", "esports", "streaming"],
    ),
    (
        Category::Travel,
        &["travel", "tourism", "hospitality", "outdoors", "adventure"],
    ),
    (
        Category::Lifestyle,
        &["lifestyle", "home", "family", "parenting", "decor"],
    ),
    (
        Category::Finance,
        &["finance", "business", "investing", "fintech", "education"],
    ),
];

const ADJACENT: [(Category, Category); 12] = [
    (Category::Fitness, Category::Food),
    (Category::Fitness, Category::Lifestyle),
    (Category::Fitness, Category::Travel),
    (Category::Fashion, Category::Beauty),
    (Category::Fashion, Category::Lifestyle),
    (Category::Beauty, Category::Lifestyle),
    (Category::Technology, Category::Gaming),
    (Category::Technology, Category::Finance),
    (Category::Food, Category::Travel),
    (Category::Food, Category::Lifestyle),
    (Category::Travel, Category::Lifestyle),
    (Category::Finance, Category::Lifestyle),
];

/// Score for an exact niche match.
pub const EXACT: f64 = 100.0;
/// Score when one label's words are all found in the other.
pub const CONTAINED: f64 = 80.0;
/// Score for distinct niches in the same category.
pub const SAME_CATEGORY: f64 = 65.0;
/// Score for niches in adjacent categories.
pub const ADJACENT_CATEGORY: f64 = 40.0;

/// Category a free-form niche label belongs to, if recognised.
///
/// # Examples
/// ```
/// use tandem_scorer::factors::niche::{Category, categorise};
///
/// assert_eq!(categorise("Home Fitness"), Some(Category::Fitness));
/// assert_eq!(categorise("knitting"), None);
/// ```
#[must_use]
pub fn categorise(label: &str) -> Option<Category> {
    let normalised = normalise_label(label);
    let label_tokens = tokens(&normalised);
    KEYWORDS
        .iter()
        .find(|(_, words)| words.contains(&normalised.as_str()))
        .or_else(|| {
            KEYWORDS
                .iter()
                .find(|(_, words)| label_tokens.iter().any(|token| words.contains(token)))
        })
        .map(|(category, _)| *category)
}

fn tokens(normalised: &str) -> BTreeSet<&str> {
    normalised
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Whether every word of one label appears in the other.
fn word_contained(a: &str, b: &str) -> bool {
    let (left, right) = (tokens(a), tokens(b));
    !left.is_empty() && !right.is_empty() && (left.is_subset(&right) || right.is_subset(&left))
}

fn adjacent(a: Category, b: Category) -> bool {
    ADJACENT
        .iter()
        .any(|(x, y)| (*x == a && *y == b) || (*x == b && *y == a))
}

/// Compatibility of a creator niche with an organisation industry.
///
/// Unrelated niches score `floor` rather than zero; a missing label is
/// uninformed.
#[must_use]
pub fn score(creator: Option<&str>, organization: Option<&str>, floor: f64) -> FactorScore {
    let (Some(creator), Some(organization)) = (creator, organization) else {
        return FactorScore::uninformed();
    };
    let a = normalise_label(creator);
    let b = normalise_label(organization);
    if a == b {
        return FactorScore::informed(EXACT);
    }
    if word_contained(&a, &b) {
        return FactorScore::informed(CONTAINED);
    }
    let value = match (categorise(&a), categorise(&b)) {
        (Some(x), Some(y)) if x == y => SAME_CATEGORY,
        (Some(x), Some(y)) if adjacent(x, y) => ADJACENT_CATEGORY,
        _ => floor,
    };
    FactorScore::informed(value.max(floor))
}
