//! The persisted music index: one entry per playable file, plus the scan
//! statistics written alongside it. Both files are whole-document
//! snapshots; every scan fully replaces them.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::normalize::normalize_opt;
use crate::{Error, Result};

/// Where an entry's title/artist came from. Weakest signal wins only when
/// the stronger ones were absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaSource {
    EasyTag,
    RawTag,
    Filename,
    PathGuess,
    #[default]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: PathBuf,
    /// Whole seconds. Files with no resolvable duration are never indexed.
    pub duration: u32,
    /// Always present; falls back to a cleaned filename stem.
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub meta_source: MetaSource,
}

/// Aggregate counters for one scan pass. Recomputed every scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub roots: Vec<String>,
    pub scanned_supported: u64,
    pub skipped_no_duration: u64,
    #[serde(default)]
    pub unreadable: u64,
    /// Roots that could not be walked at all and were skipped.
    #[serde(default)]
    pub skipped_roots: Vec<String>,
    pub indexed: u64,
}

impl ScanStats {
    pub fn absorb(&mut self, other: ScanStats) {
        self.roots.extend(other.roots);
        self.scanned_supported += other.scanned_supported;
        self.skipped_no_duration += other.skipped_no_duration;
        self.unreadable += other.unreadable;
        self.skipped_roots.extend(other.skipped_roots);
    }
}

pub fn load_index(path: &Path) -> Result<Vec<IndexEntry>> {
    if !path.exists() {
        return Err(Error::MissingIndex(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| Error::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn save_index(path: &Path, entries: &[IndexEntry]) -> Result<()> {
    write_json(path, entries)
}

pub fn save_stats(path: &Path, stats: &ScanStats) -> Result<()> {
    write_json(path, stats)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let text = serde_json::to_string_pretty(value).map_err(|e| Error::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::write(path, text).map_err(|e| Error::io(path, e))
}

/// One matchable entry: the index entry with title/artist already
/// normalized. Entries whose normalized title or artist comes out empty
/// are not matchable and never enter the buckets.
#[derive(Debug, Clone)]
pub struct MatchEntry {
    pub title: String,
    pub artist: String,
    pub duration: u32,
    pub path: PathBuf,
}

/// Duration-keyed lookup over an index, so a query touches `2*tol + 1`
/// buckets instead of the whole library.
#[derive(Debug, Default)]
pub struct DurationBuckets {
    by_duration: HashMap<u32, Vec<MatchEntry>>,
}

impl DurationBuckets {
    pub fn build(entries: &[IndexEntry]) -> Self {
        let mut by_duration: HashMap<u32, Vec<MatchEntry>> = HashMap::new();

        for entry in entries {
            let title = normalize_opt(Some(&entry.title));
            let artist = normalize_opt(entry.artist.as_deref());
            let (Some(title), Some(artist)) = (title, artist) else {
                continue;
            };
            by_duration.entry(entry.duration).or_default().push(MatchEntry {
                title,
                artist,
                duration: entry.duration,
                path: entry.path.clone(),
            });
        }

        Self { by_duration }
    }

    /// Every entry whose duration lies in `[duration - tol, duration + tol]`,
    /// bounds inclusive.
    pub fn candidates(&self, duration: u32, tolerance: u32) -> Vec<&MatchEntry> {
        let lo = duration.saturating_sub(tolerance);
        let hi = duration.saturating_add(tolerance);
        (lo..=hi)
            .filter_map(|d| self.by_duration.get(&d))
            .flatten()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_duration.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_duration.is_empty()
    }
}
