//! Duration-bucketed matching of a (title, artist, duration) query against
//! the library index, plus the orientation heuristics that turn a playlist
//! display string into candidate (title, artist) pairs.

use crate::index::{DurationBuckets, MatchEntry};
use crate::normalize::normalize;
use crate::similarity::jaccard;

/// Default duration tolerance in seconds, matching what portable players
/// store in EXTINF versus the real stream length.
pub const DEFAULT_TOLERANCE: u32 = 2;

/// Minimum title similarity when an exact artist corroborates the match.
const FUZZY_WITH_ARTIST: f64 = 0.85;
/// Minimum title similarity for title-only queries; stricter, since there
/// is no artist to back the claim up.
const FUZZY_TITLE_ONLY: f64 = 0.90;

/// Two-tier search. The exact tier returns whatever it finds, one entry or
/// many, and never falls through: an ambiguous exact set is the caller's
/// problem, not an invitation to go fuzzy. The fuzzy tier only runs when
/// the exact tier found nothing.
///
/// `title` and `artist` must already be normalized.
pub fn find_matches<'a>(
    title: &str,
    artist: Option<&str>,
    duration: u32,
    buckets: &'a DurationBuckets,
    tolerance: u32,
) -> Vec<&'a MatchEntry> {
    if title.is_empty() {
        return Vec::new();
    }

    let candidates = buckets.candidates(duration, tolerance);
    if candidates.is_empty() {
        return Vec::new();
    }

    let exact: Vec<&MatchEntry> = candidates
        .iter()
        .filter(|c| c.title == title && artist.map_or(true, |a| c.artist == a))
        .copied()
        .collect();
    if !exact.is_empty() {
        return exact;
    }

    candidates
        .iter()
        .filter(|c| match artist {
            Some(a) => c.artist == a && jaccard(&c.title, title) >= FUZZY_WITH_ARTIST,
            None => jaccard(&c.title, title) >= FUZZY_TITLE_ONLY,
        })
        .copied()
        .collect()
}

/// Parse a display string (typically the EXTINF description) into candidate
/// (title, artist) pairs, split on " - " after dash normalization.
///
/// Which side of the dash is the title is unknowable in general, so for two
/// segments both orientations are emitted; for three or more a small fixed
/// set covers the common "artist - title - extra" and "title - extra -
/// artist" export shapes, plus title-only fallbacks. Pairs are deduplicated
/// preserving generation order, and that order (not any similarity score)
/// is the tie-break when several orientations later match.
pub fn candidate_pairs(display: &str) -> Vec<(String, Option<String>)> {
    let unified: String = display
        .chars()
        .map(|c| match c {
            '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect();

    let parts: Vec<String> = split_on_spaced_hyphen(unified.trim())
        .into_iter()
        .filter_map(|p| normalize(p))
        .collect();
    if parts.is_empty() {
        return Vec::new();
    }

    let join = |slice: &[String]| slice.join(" - ");
    let mut pairs: Vec<(String, Option<String>)> = Vec::new();

    match parts.len() {
        1 => pairs.push((parts[0].clone(), None)),
        2 => {
            pairs.push((parts[0].clone(), Some(parts[1].clone())));
            pairs.push((parts[1].clone(), Some(parts[0].clone())));
        }
        n => {
            // artist - title - extra...
            pairs.push((parts[1].clone(), Some(parts[0].clone())));
            pairs.push((join(&parts[1..]), Some(parts[0].clone())));
            // title - extra... - artist
            pairs.push((join(&parts[..n - 1]), Some(parts[n - 1].clone())));
            // title-only fallbacks
            pairs.push((join(&parts), None));
            pairs.push((join(&parts[..n - 1]), None));
            pairs.push((parts[1].clone(), None));
        }
    }

    let mut seen = std::collections::HashSet::new();
    pairs
        .into_iter()
        .filter(|(title, _)| !title.is_empty())
        .filter(|pair| seen.insert(pair.clone()))
        .collect()
}

/// Split on hyphens that have whitespace on both sides, so hyphenated
/// words ("Re-Up") survive while " - " separators split.
fn split_on_spaced_hyphen(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'-'
            && i > 0
            && bytes[i - 1].is_ascii_whitespace()
            && i + 1 < bytes.len()
            && bytes[i + 1].is_ascii_whitespace()
        {
            segments.push(text[start..i].trim());
            start = i + 1;
        }
        i += 1;
    }
    segments.push(text[start..].trim());
    segments.into_iter().filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{DurationBuckets, IndexEntry, MetaSource};
    use std::path::PathBuf;

    fn index_of(specs: &[(&str, &str, u32, &str)]) -> DurationBuckets {
        let entries: Vec<IndexEntry> = specs
            .iter()
            .map(|(title, artist, duration, path)| IndexEntry {
                path: PathBuf::from(path),
                duration: *duration,
                title: (*title).into(),
                artist: Some((*artist).into()),
                meta_source: MetaSource::EasyTag,
            })
            .collect();
        DurationBuckets::build(&entries)
    }

    #[test]
    fn single_exact_match_is_unambiguous() {
        let buckets = index_of(&[
            ("Karma Police", "Radiohead", 261, "/m/kp.mp3"),
            ("Other Song", "Radiohead", 261, "/m/os.mp3"),
        ]);
        let hits = find_matches("karma police", Some("radiohead"), 262, &buckets, 2);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, PathBuf::from("/m/kp.mp3"));
    }

    #[test]
    fn duplicate_exact_matches_stay_ambiguous() {
        let buckets = index_of(&[
            ("Karma Police", "Radiohead", 261, "/m/a/kp.mp3"),
            ("Karma Police", "Radiohead", 261, "/m/b/kp.mp3"),
        ]);
        let hits = find_matches("karma police", Some("radiohead"), 261, &buckets, 2);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn exact_tier_never_falls_through_to_fuzzy() {
        // A perfect title sits next to a near-duplicate; exact tier
        // returns only the perfect one.
        let buckets = index_of(&[
            ("Blue Train", "Coltrane", 300, "/m/exact.flac"),
            ("Blue Train Take Two", "Coltrane", 300, "/m/fuzzy.flac"),
        ]);
        let hits = find_matches("blue train", Some("coltrane"), 300, &buckets, 2);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, PathBuf::from("/m/exact.flac"));
    }

    #[test]
    fn fuzzy_requires_artist_agreement_when_artist_given() {
        let buckets = index_of(&[("one two three four five six seven", "someone", 180, "/m/x.mp3")]);
        // same near-identical title, wrong artist
        let hits = find_matches(
            "one two three four five six",
            Some("somebody else"),
            180,
            &buckets,
            2,
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn title_only_fuzzy_uses_stricter_threshold() {
        let buckets = index_of(&[("alpha beta gamma delta epsilon zeta eta theta iota kappa", "x", 200, "/m/t.mp3")]);
        // 9 of 10 tokens shared: jaccard 0.9 passes the title-only tier
        let hits = find_matches(
            "alpha beta gamma delta epsilon zeta eta theta iota",
            None,
            200,
            &buckets,
            2,
        );
        assert_eq!(hits.len(), 1);
        // 8 of 10: jaccard 0.8 fails
        let hits = find_matches(
            "alpha beta gamma delta epsilon zeta eta theta",
            None,
            200,
            &buckets,
            2,
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn duration_gate_applies_before_anything_else() {
        let buckets = index_of(&[("tune", "band", 100, "/m/t.mp3")]);
        assert!(find_matches("tune", Some("band"), 110, &buckets, 2).is_empty());
    }

    #[test]
    fn two_segment_display_yields_both_orientations() {
        let pairs = candidate_pairs("6lack - Loaded Gun");
        assert_eq!(
            pairs,
            vec![
                ("6lack".to_string(), Some("loaded gun".to_string())),
                ("loaded gun".to_string(), Some("6lack".to_string())),
            ]
        );
    }

    #[test]
    fn single_segment_is_title_only() {
        assert_eq!(
            candidate_pairs("Instrumental"),
            vec![("instrumental".to_string(), None)]
        );
    }

    #[test]
    fn multi_dash_display_emits_the_fixed_conservative_set() {
        let pairs = candidate_pairs("6lack - Loaded Gun - AKE");
        let expected: Vec<(String, Option<String>)> = vec![
            ("loaded gun".into(), Some("6lack".into())),
            ("loaded gun - ake".into(), Some("6lack".into())),
            ("6lack - loaded gun".into(), Some("ake".into())),
            ("6lack - loaded gun - ake".into(), None),
            ("6lack - loaded gun".into(), None),
            ("loaded gun".into(), None),
        ];
        assert_eq!(pairs, expected);
    }

    #[test]
    fn hyphenated_words_do_not_split() {
        let pairs = candidate_pairs("Re-Up Gang - We Got It");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, "re-up gang");
    }

    #[test]
    fn en_dash_separators_are_unified() {
        let pairs = candidate_pairs("Artist \u{2013} Title");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], ("artist".to_string(), Some("title".to_string())));
    }
}
