//! Platform overlap as Jaccard similarity.

use std::collections::BTreeSet;

use tandem_core::profile::normalise_label;

use super::FactorScore;

/// Jaccard similarity of two platform sets scaled to `0..=100`.
///
/// Platform names are compared case-insensitively. An empty set on either
/// side is uninformed.
///
/// # Examples
/// ```
/// use std::collections::BTreeSet;
/// use tandem_scorer::factors::platform::score;
///
/// let a = BTreeSet::from(["Instagram".to_owned(), "TikTok".to_owned()]);
/// let b = BTreeSet::from(["instagram".to_owned(), "YouTube".to_owned()]);
/// assert_eq!(score(&a, &b).value.round(), 33.0);
/// ```
#[must_use]
pub fn score(a: &BTreeSet<String>, b: &BTreeSet<String>) -> FactorScore {
    let left = fold(a);
    let right = fold(b);
    if left.is_empty() || right.is_empty() {
        return FactorScore::uninformed();
    }
    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    FactorScore::informed(ratio(shared, union))
}

fn fold(platforms: &BTreeSet<String>) -> BTreeSet<String> {
    platforms
        .iter()
        .map(|p| normalise_label(p))
        .filter(|p| !p.is_empty())
        .collect()
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "set sizes are small and scaled to a percentage"
)]
fn ratio(shared: usize, union: usize) -> f64 {
    if union == 0 {
        return 0.0;
    }
    shared as f64 / union as f64 * 100.0
}

#[cfg(test)]
#[expect(
    clippy::float_arithmetic,
    reason = "assertions compare Jaccard ratios"
)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[rstest]
    #[case(&["Instagram", "TikTok"], &["Instagram", "YouTube"], 100.0 / 3.0)]
    #[case(&["Instagram"], &["instagram"], 100.0)]
    #[case(&["TikTok"], &["YouTube"], 0.0)]
    fn computes_jaccard(#[case] a: &[&str], #[case] b: &[&str], #[case] expected: f64) {
        let result = score(&set(a), &set(b));
        assert!((result.value - expected).abs() < 1e-9);
        assert_eq!(result.support, 1.0);
    }

    #[rstest]
    fn empty_sets_are_uninformed() {
        assert_eq!(score(&set(&[]), &set(&["TikTok"])), FactorScore::uninformed());
        assert_eq!(score(&set(&["  "]), &set(&["TikTok"])), FactorScore::uninformed());
    }
}
