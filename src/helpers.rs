//! Small text-normalization helpers shared by the matching and
//! recommendation code.

use std::collections::HashSet;

/// Split a comma-separated tag string into a set of lowercased, trimmed,
/// non-empty tags.
pub fn interest_tags(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Split free text into a set of lowercased whitespace-separated tokens.
pub fn text_tokens(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Number of elements two tag sets share.
pub fn overlap_count(a: &HashSet<String>, b: &HashSet<String>) -> usize {
    a.intersection(b).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_trim_and_lowercase() {
        let tags = interest_tags(" Rust ,, data science,AI ");
        assert_eq!(tags.len(), 3);
        assert!(tags.contains("rust"));
        assert!(tags.contains("data science"));
        assert!(tags.contains("ai"));
    }

    #[test]
    fn token_overlap() {
        let a = interest_tags("fintech,design");
        let b = text_tokens("Modern fintech startup focused on payment design");
        assert_eq!(overlap_count(&a, &b), 2);
    }

    #[test]
    fn empty_input_yields_empty_set() {
        assert!(interest_tags("").is_empty());
        assert!(text_tokens("   ").is_empty());
    }
}
