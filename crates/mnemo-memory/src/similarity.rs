//! Set-overlap scores shared by the tiers.

use mnemo_core::Context;
use std::collections::BTreeSet;

/// Jaccard index of two sets. Two empty sets score 0.
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}

/// Jaccard index over the key sets of two contexts.
pub fn context_key_overlap(a: &Context, b: &Context) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.keys().filter(|k| b.contains_key(*k)).count();
    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}

/// Fraction of `query` that also appears in `target`. An empty query scores 0.
pub fn coverage<T: Ord>(query: &BTreeSet<T>, target: &BTreeSet<T>) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    query.intersection(target).count() as f64 / query.len() as f64
}

/// Fraction of the query context's keys present in `target`.
pub fn context_key_coverage(query: &Context, target: &Context) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    query.keys().filter(|k| target.contains_key(*k)).count() as f64 / query.len() as f64
}

/// Whether two sets share at least one element.
pub fn intersects<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> bool {
    a.intersection(b).next().is_some()
}

/// Lowercase every tag.
pub fn normalize_tags<'a, I>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    tags.into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_jaccard() {
        let a = set(&["grade", "point", "average"]);
        let b = set(&["grade", "report"]);
        assert!((jaccard(&a, &b) - 0.25).abs() < 1e-12);
        assert_eq!(jaccard(&a, &a), 1.0);
        assert_eq!(jaccard(&set(&[]), &set(&[])), 0.0);
        assert_eq!(jaccard(&a, &set(&[])), 0.0);
    }

    #[test]
    fn test_context_key_overlap() {
        let mut a = Context::new();
        a.insert("domain".into(), serde_json::json!("research"));
        a.insert("course".into(), serde_json::json!("cs101"));
        let mut b = Context::new();
        b.insert("domain".into(), serde_json::json!("career"));
        assert!((context_key_overlap(&a, &b) - 0.5).abs() < 1e-12);
        assert_eq!(context_key_overlap(&Context::new(), &Context::new()), 0.0);
    }

    #[test]
    fn test_coverage() {
        let q = set(&["deadline"]);
        let t = set(&["research", "proposal", "deadline"]);
        assert_eq!(coverage(&q, &t), 1.0);
        assert_eq!(coverage(&t, &q), 1.0 / 3.0);
        assert_eq!(coverage(&set(&[]), &t), 0.0);
    }

    #[test]
    fn test_normalize_tags() {
        let raw = vec![" Research ".to_string(), "".to_string(), "DEADLINE".to_string()];
        assert_eq!(normalize_tags(&raw), set(&["deadline", "research"]));
    }
}
