//! Token-set similarity over normalized text.

use std::collections::HashSet;

/// Characters that separate tokens, beyond plain whitespace.
const TOKEN_SEPARATORS: [char; 9] = ['/', '\\', '-', ':', ',', ';', '.', '!', '?'];

/// Split normalized text into its token set. Empty tokens are dropped, so
/// punctuation runs never produce phantom entries.
pub fn tokenize(text: &str) -> HashSet<&str> {
    text.split(|c: char| c.is_whitespace() || TOKEN_SEPARATORS.contains(&c))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Jaccard similarity of the token sets of `a` and `b`, in `[0, 1]`.
/// Returns 0.0 when either side tokenizes to nothing; that is a valid
/// "no evidence" answer, not an error.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let inter = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    inter as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_punctuation_class() {
        let tokens = tokenize("one/two\\three-four:five,six.seven");
        assert_eq!(tokens.len(), 7);
        assert!(tokens.contains("four"));
    }

    #[test]
    fn jaccard_is_symmetric() {
        let a = "night moves part two";
        let b = "night moves";
        assert_eq!(jaccard(a, b), jaccard(b, a));
    }

    #[test]
    fn jaccard_identity_is_one() {
        assert_eq!(jaccard("same title here", "same title here"), 1.0);
    }

    #[test]
    fn jaccard_empty_side_is_zero() {
        assert_eq!(jaccard("", "something"), 0.0);
        assert_eq!(jaccard("something", ""), 0.0);
        assert_eq!(jaccard("...", "something"), 0.0);
    }

    #[test]
    fn jaccard_partial_overlap() {
        // {a, b, c} vs {b, c, d}: 2 shared of 4 total
        assert_eq!(jaccard("a b c", "b c d"), 0.5);
    }
}
