//! Text canonicalization used by every comparison in the crate.
//!
//! `normalize` is deliberately aggressive: titles coming from tags, from
//! filenames and from playlist display strings disagree on dashes, quote
//! glyphs, bracket qualifiers and casing, and all of them have to land on
//! the same canonical form before any equality or similarity check.

use std::path::Path;

/// Prefixes that the repair/export pipeline prepends to playlist names.
/// Order matters: the longer generated prefixes are stripped first.
const GENERATED_PREFIXES: [&str; 3] = ["__tmp_fixed_", "draft_fixed_", "fixed_"];
const GENERATED_SUFFIXES: [&str; 1] = ["_selected"];

/// Canonicalize free text for comparison. Returns `None` when nothing
/// survives. Idempotent: `normalize(&normalize(x))` is a no-op.
pub fn normalize(text: &str) -> Option<String> {
    let mut s = String::with_capacity(text.len());

    for c in text.trim().chars() {
        match c {
            // en/em dash to plain hyphen
            '\u{2013}' | '\u{2014}' => s.push('-'),
            // apostrophe and quote variants are deleted outright so that
            // "He's" and "Hes" normalize identically
            '\'' | '\u{2019}' | '\u{2018}' | '`' | '\u{00B4}' => {}
            // separator punctuation becomes a space
            '\u{00B7}' | '\u{2022}' | '|' => s.push(' '),
            '_' | '\u{3000}' => s.push(' '),
            _ => s.extend(c.to_lowercase()),
        }
    }

    let s = normalize_feat(&s);
    let s = strip_bracketed(&s);

    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Convenience wrapper for optional inputs.
pub fn normalize_opt(text: Option<&str>) -> Option<String> {
    text.and_then(normalize)
}

/// Rewrite the featuring-credit tokens "feat." / "ft." to plain "feat".
fn normalize_feat(s: &str) -> String {
    s.split(' ')
        .map(|tok| match tok {
            "feat." | "ft." => "feat",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove bracketed qualifier spans: `(...)`, `[...]`, `{...}`.
/// Non-recursive, shortest match: each opener is dropped together with
/// everything up to the nearest closer of any type; an opener with no
/// closer after it is kept as-is.
fn strip_bracketed(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if matches!(c, '(' | '[' | '{') {
            if let Some(off) = chars[i + 1..]
                .iter()
                .position(|&c| matches!(c, ')' | ']' | '}'))
            {
                i += off + 2;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }

    out
}

/// Derive the stable identity of a playlist from its filename stem,
/// collapsing the generated-name variants produced by repair and export:
/// `15.m3u`, `fixed_15.m3u`, `fixed_15_selected.m3u` and
/// `__tmp_fixed_15.m3u` all map to `"15"`.
///
/// Stripping is case-sensitive; if nothing survives, the original stem is
/// returned unchanged.
pub fn canonical_key(playlist: &Path) -> String {
    let stem = playlist
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut key = stem.as_str();
    for prefix in GENERATED_PREFIXES {
        if let Some(rest) = key.strip_prefix(prefix) {
            key = rest;
        }
    }
    for suffix in GENERATED_SUFFIXES {
        if let Some(rest) = key.strip_suffix(suffix) {
            key = rest;
        }
    }

    let key = key.trim();
    if key.is_empty() {
        stem
    } else {
        key.to_string()
    }
}
