//! Library scanning: walk music roots, extract (duration, title, artist)
//! per file through a tiered fallback, and build the index.
//!
//! Tier order per file:
//!   1. easy tags: accessor fields of the file's primary tag
//!   2. raw tags: frame/item lookup across all tags (AIFF-family files
//!      commonly populate only these), plus a symphonia probe for the
//!      duration when lofty cannot parse the container
//!   3. filename-derived title (always available)
//!   4. path-derived artist guess (weak signal, tag artists win)
//!
//! The only condition that drops a file is a missing duration. Unreadable
//! or tag-less files degrade through the tiers and stay in the index.

use std::fs::File;
use std::path::Path;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::{Accessor, ItemKey, ItemValue, Tag};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::index::{IndexEntry, MetaSource, ScanStats};

/// Extensions the scanner considers playable library content.
pub const SUPPORTED_EXTS: [&str; 16] = [
    "flac", "alac", "m4a", "mp4", "aac", "mp3", "ogg", "opus", "wav", "aif", "aiff", "aifc",
    "ape", "wv", "dsf", "dff",
];

/// Folder names that describe library structure rather than an artist.
/// Compared case-insensitively with collapsed whitespace.
const GENERIC_PATH_TOKENS: [&str; 29] = [
    "music",
    "itunes",
    "itunes media",
    "media",
    "hi-res",
    "hires",
    "lossless",
    "lossy",
    "downloads",
    "download",
    "album",
    "albums",
    "disc",
    "cd",
    "cd1",
    "cd2",
    "cd3",
    "deluxe",
    "edition",
    "remaster",
    "remastered",
    "single",
    "singles",
    "ep",
    "compilations",
    "various artists",
    "va",
    "unknown",
    "unknown artist",
];

/// Raw frame/item names for the title family, uppercased for lookup.
const RAW_TITLE_KEYS: [&str; 4] = ["TIT2", "TITLE", "\u{a9}NAM", "INAM"];
const RAW_ARTIST_KEYS: [&str; 4] = ["TPE1", "ARTIST", "\u{a9}ART", "IART"];
const RAW_ALBUM_ARTIST_KEYS: [&str; 3] = ["TPE2", "ALBUMARTIST", "AART"];

/// Result of one root's scan pass.
#[derive(Debug, Default)]
pub struct RootScan {
    pub entries: Vec<IndexEntry>,
    pub stats: ScanStats,
}

/// Recursively scan one root. A root that cannot be walked at all is
/// recorded in `skipped_roots` and produces no entries; per-file failures
/// never abort the walk.
pub fn scan_root(root: &Path) -> RootScan {
    let mut scan = RootScan::default();
    scan.stats.roots.push(root.display().to_string());

    if !root.is_dir() {
        warn!(root = %root.display(), "root is not a readable directory, skipping");
        scan.stats.skipped_roots.push(root.display().to_string());
        return scan;
    }

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "walk error, skipping entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !SUPPORTED_EXTS.contains(&ext.to_lowercase().as_str()) {
            continue;
        }
        scan.stats.scanned_supported += 1;

        match extract(path, &mut scan.stats) {
            Some(indexed) => scan.entries.push(indexed),
            None => scan.stats.skipped_no_duration += 1,
        }
    }

    scan.stats.indexed = scan.entries.len() as u64;
    scan
}

/// Tag/duration extraction for one supported file. `None` means the file
/// has no resolvable duration and must not be indexed.
fn extract(path: &Path, stats: &mut ScanStats) -> Option<IndexEntry> {
    let mut duration: Option<u32> = None;
    let mut title: Option<String> = None;
    let mut artist: Option<String> = None;
    let mut meta_source = MetaSource::None;

    match lofty::read_from_path(path) {
        Ok(tagged) => {
            duration = duration_secs(&tagged);

            // Tier 1: easy tags off the primary tag.
            if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
                let t = non_empty(tag.title().as_deref());
                let a = non_empty(tag.artist().as_deref())
                    .or_else(|| non_empty(tag.get_string(&ItemKey::AlbumArtist)));
                if t.is_some() || a.is_some() {
                    title = t;
                    artist = a;
                    meta_source = MetaSource::EasyTag;
                }
            }

            // Tier 2: raw frame lookup, only when easy tags gave nothing.
            if meta_source == MetaSource::None {
                let (t, a) = read_raw_tags(&tagged);
                if t.is_some() || a.is_some() {
                    title = t;
                    artist = a;
                    meta_source = MetaSource::RawTag;
                }
            }
        }
        Err(e) => {
            // Unreadable for the tag layer; keep going with stream info only.
            debug!(path = %path.display(), error = %e, "tag read failed");
            stats.unreadable += 1;
        }
    }

    if duration.is_none() {
        duration = symphonia_duration(path);
    }
    let duration = match duration {
        Some(d) => d,
        None => {
            debug!(path = %path.display(), "no resolvable duration, skipping");
            return None;
        }
    };

    // Tier 3: filename always yields a title.
    if title.is_none() {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        title = Some(clean_filename_title(&stem));
        if meta_source == MetaSource::None {
            meta_source = MetaSource::Filename;
        }
    }

    // Tier 4: path segments, only when no tag gave an artist.
    if artist.is_none() {
        if let Some(guess) = guess_artist_from_path(path) {
            artist = Some(guess);
            if matches!(meta_source, MetaSource::Filename | MetaSource::None) {
                meta_source = MetaSource::PathGuess;
            }
        }
    }

    Some(IndexEntry {
        path: path.to_path_buf(),
        duration,
        title: title.unwrap_or_default(),
        artist,
        meta_source,
    })
}

fn duration_secs(tagged: &lofty::file::TaggedFile) -> Option<u32> {
    let secs = tagged.properties().duration().as_secs_f64().round() as u64;
    (secs > 0).then_some(secs as u32)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Look through every tag container in the file for the title/artist frame
/// families. Falls back to album-artist frames when no artist frame exists.
fn read_raw_tags(tagged: &lofty::file::TaggedFile) -> (Option<String>, Option<String>) {
    let mut title = None;
    let mut artist = None;
    let mut album_artist = None;

    for tag in tagged.tags() {
        if title.is_none() {
            title = non_empty(tag.get_string(&ItemKey::TrackTitle))
                .or_else(|| raw_item(tag, &RAW_TITLE_KEYS));
        }
        if artist.is_none() {
            artist = non_empty(tag.get_string(&ItemKey::TrackArtist))
                .or_else(|| raw_item(tag, &RAW_ARTIST_KEYS));
        }
        if album_artist.is_none() {
            album_artist = non_empty(tag.get_string(&ItemKey::AlbumArtist))
                .or_else(|| raw_item(tag, &RAW_ALBUM_ARTIST_KEYS));
        }
    }

    (title, artist.or(album_artist))
}

fn raw_item(tag: &Tag, keys: &[&str]) -> Option<String> {
    for item in tag.items() {
        let ItemKey::Unknown(name) = item.key() else {
            continue;
        };
        if !keys.contains(&name.to_uppercase().as_str()) {
            continue;
        }
        if let ItemValue::Text(text) = item.value() {
            if let Some(v) = non_empty(Some(text.as_str())) {
                return Some(v);
            }
        }
    }
    None
}

/// Duration via a symphonia format probe, for containers lofty cannot
/// parse. Reads stream parameters only; no decoding.
fn symphonia_duration(path: &Path) -> Option<u32> {
    let file = File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;

    let track = probed.format.default_track()?;
    let time_base = track.codec_params.time_base?;
    let n_frames = track.codec_params.n_frames?;

    let time = time_base.calc_time(n_frames);
    let secs = (time.seconds as f64 + time.frac).round() as u64;
    (secs > 0).then_some(secs as u32)
}

/// Strip a leading numeric track prefix (one or more groups of optional
/// parenthesis, one to three digits, and separator punctuation) from a
/// filename stem, then collapse whitespace.
pub fn clean_filename_title(stem: &str) -> String {
    let mut rest = stem.trim_start();

    loop {
        let mut chars = rest.char_indices().peekable();
        let mut pos = 0;

        if let Some(&(_, '(')) = chars.peek() {
            chars.next();
            pos += 1;
        }

        let digits_start = pos;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_ascii_digit() && i - digits_start < 3 {
                chars.next();
                pos = i + c.len_utf8();
            } else {
                break;
            }
        }
        if pos == digits_start {
            break;
        }

        if let Some(&(i, ')')) = chars.peek() {
            chars.next();
            pos = i + 1;
        }

        let sep_start = pos;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() || matches!(c, '.' | '_' | '-') {
                chars.next();
                pos = i + c.len_utf8();
            } else {
                break;
            }
        }
        if pos == sep_start {
            break;
        }

        rest = &rest[pos..];
    }

    rest.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Walk the parent segments of `path` from deepest to shallowest and return
/// the first one that looks like it could name an artist. Years, disc
/// numbers and generic library folders are skipped.
pub fn guess_artist_from_path(path: &Path) -> Option<String> {
    let parent = path.parent()?;

    let segments: Vec<String> = parent
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    for segment in segments.iter().rev() {
        let seg = segment.trim();
        if seg.is_empty() || seg.chars().count() <= 2 {
            continue;
        }
        if seg.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if is_year(seg) {
            continue;
        }
        let folded = seg.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
        if GENERIC_PATH_TOKENS.contains(&folded.as_str()) {
            continue;
        }
        return Some(seg.to_string());
    }
    None
}

fn is_year(s: &str) -> bool {
    s.len() == 4
        && (s.starts_with("19") || s.starts_with("20"))
        && s.chars().all(|c| c.is_ascii_digit())
}
