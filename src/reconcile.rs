//! Reconciliation of repair reports with manual selections.
//!
//! Reports may come from different versions with different status
//! vocabularies, so classification is keyword-based and explicit; an
//! unrecognized status is a first-class `Unknown`, never silently treated
//! as failed. Manual selections exist in two provenances at once, the
//! persisted per-playlist file and the unsaved in-session map, and the
//! precedence rules between them live here, threaded through an explicit
//! [`ReconciliationContext`] instead of ambient state.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::normalize::canonical_key;
use crate::playlist::format_extinf;
use crate::report::RawRow;
use crate::{Error, Result};

/// Keyword tables for status classification, checked in this priority
/// order. Containment, not equality: "MULTI_MATCH_3" is ambiguous,
/// "done_ok" is resolved.
const RESOLVED_KEYWORDS: [&str; 7] = ["KEPT", "REPAIRED", "FIXED", "OK", "DONE", "SUCCESS", "RESOLV"];
const AMBIGUOUS_KEYWORDS: [&str; 6] = ["AMBIG", "MULTI", "CONFLICT", "DUPLIC", "CANDIDATE", "MULTIPLE"];
const FAILED_KEYWORDS: [&str; 7] = ["FAIL", "NOT_FOUND", "NOTFOUND", "MISSING", "MISS", "ERROR", "ERR"];

/// Columns that may carry a final/chosen path, probed in order. The
/// candidates list in `notes` is deliberately NOT part of this set.
const FINAL_PATH_COLUMNS: [&str; 20] = [
    "written_path",
    "written",
    "final_path",
    "final",
    "resolved_path",
    "resolved",
    "picked_path",
    "picked",
    "chosen_path",
    "chosen",
    "selected_path",
    "selected",
    "output_path",
    "output",
    "result_path",
    "result",
    "target_path",
    "target",
    "matched_path",
    "matched",
];

const CANDIDATES_MARKER: &str = "candidates:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Resolved,
    Ambiguous,
    Failed,
    Unknown,
}

/// Classify a raw status string from any report vocabulary.
pub fn classify_status(raw: &str) -> StatusClass {
    let status = raw.trim().to_uppercase();
    if status.is_empty() {
        return StatusClass::Unknown;
    }
    if RESOLVED_KEYWORDS.iter().any(|k| status.contains(k)) {
        return StatusClass::Resolved;
    }
    if AMBIGUOUS_KEYWORDS.iter().any(|k| status.contains(k)) {
        return StatusClass::Ambiguous;
    }
    if FAILED_KEYWORDS.iter().any(|k| status.contains(k)) {
        return StatusClass::Failed;
    }
    StatusClass::Unknown
}

/// Extract candidate file paths from a notes field. Text after a
/// case-insensitive `candidates:` marker (or the whole field without one)
/// is split on `|`; a token survives only if it has a path separator and
/// its basename contains a dot and is at least three characters: a
/// "looks like a real file" filter that drops status fragments.
pub fn parse_candidates(notes: &str) -> Vec<String> {
    let notes = notes.trim();
    if notes.is_empty() {
        return Vec::new();
    }

    let lower = notes.to_lowercase();
    let rest = match lower.find(CANDIDATES_MARKER) {
        Some(idx) => notes
            .get(idx + CANDIDATES_MARKER.len()..)
            .unwrap_or(notes),
        None => notes,
    };

    rest.split('|')
        .filter_map(|part| {
            let p = part.trim().trim_matches('"').trim_matches('\'').trim();
            if p.is_empty() {
                return None;
            }
            let has_separator = p.contains(":\\") || p.contains('/') || p.contains('\\');
            let name = Path::new(p)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let looks_like_file = name.contains('.') && name.chars().count() >= 3;
            (has_separator && looks_like_file).then(|| p.to_string())
        })
        .collect()
}

/// First non-empty value among the final-path column whitelist.
pub fn pick_final_path(row: &RawRow) -> Option<String> {
    FINAL_PATH_COLUMNS
        .iter()
        .find_map(|col| row.get(col))
        .map(|v| v.trim().to_string())
}

/// Per-canonical-key manual selections: row index (as string) to the
/// chosen file path.
pub type SelectionMap = BTreeMap<String, String>;

/// Whether a playlist file is a previously-exported artifact of this tool,
/// judged by its generated name. Only exported playlists are allowed to
/// read persisted selections back from disk.
pub fn is_exported_playlist(playlist: &Path) -> bool {
    let stem = playlist
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    stem.starts_with("fixed_") || stem.starts_with("draft_fixed_") || stem.contains("_selected")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    Manual,
    Auto,
}

/// One row of a reconciliation view.
#[derive(Debug, Clone)]
pub struct ViewRow {
    pub playlist: PathBuf,
    pub key: String,
    pub row_index: String,
    pub display: String,
    pub original_path: String,
    pub notes: String,
    pub candidates: Vec<String>,
    /// An in-session selection not yet saved; the row stays visible in the
    /// unresolved view but carries its pending choice.
    pub pending_selection: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UnresolvedView {
    pub ambiguous: Vec<ViewRow>,
    pub failed: Vec<ViewRow>,
}

#[derive(Debug, Clone)]
pub struct ResolvedRow {
    pub row: ViewRow,
    pub source: SelectionSource,
    /// The path the export would write for this row right now.
    pub after: String,
    pub status: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedView {
    pub ambiguous_like: Vec<ResolvedRow>,
    pub failed_like: Vec<ResolvedRow>,
}

/// Explicit reconciliation state: the in-session selections, the keys saved
/// this session, and the keys repaired this session (the import-freshness
/// gate). Persisted selections are read through this context but only ever
/// written by [`ReconciliationContext::save_selections`].
#[derive(Debug, Default)]
pub struct ReconciliationContext {
    reports_dir: PathBuf,
    session: BTreeMap<String, SelectionMap>,
    saved_keys: BTreeSet<String>,
    repaired_keys: BTreeSet<String>,
}

impl ReconciliationContext {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            ..Default::default()
        }
    }

    pub fn selections_path(&self, key: &str) -> PathBuf {
        self.reports_dir.join(format!("selections_{key}.json"))
    }

    /// Load the persisted selection map for a key. Missing or unreadable
    /// files are an empty map, not an error: a selection file only exists
    /// after an explicit save.
    pub fn load_persisted(&self, key: &str) -> SelectionMap {
        let path = self.selections_path(key);
        let Ok(text) = fs::read_to_string(&path) else {
            return SelectionMap::new();
        };
        serde_json::from_str(&text).unwrap_or_default()
    }

    /// Record that a playlist key went through a repair pass this session,
    /// opening the gate for its reports and selections to be shown.
    pub fn mark_repaired(&mut self, key: &str) {
        self.repaired_keys.insert(key.to_string());
    }

    /// Record an in-session manual selection. Nothing is persisted until
    /// [`Self::save_selections`].
    pub fn apply_selection(&mut self, key: &str, row_index: &str, chosen: impl Into<String>) {
        self.session
            .entry(key.to_string())
            .or_default()
            .insert(row_index.to_string(), chosen.into());
    }

    pub fn session_selections(&self, key: &str) -> SelectionMap {
        self.session.get(key).cloned().unwrap_or_default()
    }

    /// Merge the session map into the persisted one (session wins), write
    /// the snapshot, and mark the key saved so its rows retire from the
    /// unresolved view.
    pub fn save_selections(&mut self, key: &str) -> Result<SelectionMap> {
        let mut merged = self.load_persisted(key);
        merged.extend(self.session_selections(key));

        let path = self.selections_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let text = serde_json::to_string_pretty(&merged).map_err(|e| Error::Json {
            path: path.clone(),
            source: e,
        })?;
        fs::write(&path, text).map_err(|e| Error::io(&path, e))?;

        self.saved_keys.insert(key.to_string());
        debug!(key, rows = merged.len(), "selections saved");
        Ok(merged)
    }

    /// Bring a key's persisted selections into the session map. For a
    /// short-lived caller the save happened in an earlier process, so an
    /// explicit request to work on a playlist adopts its saved choices;
    /// selections already applied this session win over adopted ones.
    pub fn adopt_persisted(&mut self, key: &str) {
        let persisted = self.load_persisted(key);
        let session = self.session.entry(key.to_string()).or_default();
        for (row, path) in persisted {
            session.entry(row).or_insert(path);
        }
    }

    /// The selections the export should honor for this playlist: persisted
    /// (exported playlists only) overlaid with the session map, session
    /// winning on conflicts.
    pub fn effective_selections(&self, playlist: &Path) -> SelectionMap {
        let key = canonical_key(playlist);
        let mut merged = if is_exported_playlist(playlist) {
            self.load_persisted(&key)
        } else {
            SelectionMap::new()
        };
        merged.extend(self.session_selections(&key));
        merged
    }

    /// Import-freshness gate: a fresh (non-exported) import shows no stale
    /// on-disk state until it has been repaired this session. This keeps a
    /// canonical-key collision with some earlier playlist from silently
    /// suppressing rows of a newly imported one.
    pub fn shows_reports_for(&self, playlist: &Path) -> bool {
        is_exported_playlist(playlist) || self.repaired_keys.contains(&canonical_key(playlist))
    }

    /// Rows still needing a human: AMBIGUOUS or FAILED, minus rows already
    /// covered by a persisted selection (a prior completed save), minus
    /// rows saved this session. Unknown statuses never appear.
    pub fn unresolved_view(&self, playlist: &Path, rows: &[RawRow]) -> UnresolvedView {
        let mut view = UnresolvedView::default();
        if !self.shows_reports_for(playlist) {
            return view;
        }

        let key = canonical_key(playlist);
        let persisted = if is_exported_playlist(playlist) {
            self.load_persisted(&key)
        } else {
            SelectionMap::new()
        };
        let session = self.session_selections(&key);
        let saved = self.saved_keys.contains(&key);

        for row in rows {
            let class = classify_status(row.status());
            if !matches!(class, StatusClass::Ambiguous | StatusClass::Failed) {
                continue;
            }
            if persisted.contains_key(&row.row_index) {
                continue;
            }
            let pending = match session.get(&row.row_index) {
                Some(_) if saved => continue,
                Some(chosen) => Some(chosen.clone()),
                None => None,
            };

            let view_row = ViewRow {
                playlist: playlist.to_path_buf(),
                key: key.clone(),
                row_index: row.row_index.clone(),
                display: row.display().to_string(),
                original_path: row.original_path().to_string(),
                notes: row.notes().to_string(),
                candidates: parse_candidates(row.notes()),
                pending_selection: pending,
            };
            match class {
                StatusClass::Ambiguous => view.ambiguous.push(view_row),
                _ => view.failed.push(view_row),
            }
        }
        view
    }

    /// Rows considered settled: classified RESOLVED, or carrying a manual
    /// selection regardless of status text. Bucketed by the original
    /// classification, or by the candidates-in-notes heuristic when the
    /// status is not an ambiguous/failed kind.
    pub fn resolved_view(&self, playlist: &Path, rows: &[RawRow]) -> ResolvedView {
        let mut view = ResolvedView::default();
        if !self.shows_reports_for(playlist) {
            return view;
        }

        let key = canonical_key(playlist);
        let selections = self.effective_selections(playlist);

        for row in rows {
            let class = classify_status(row.status());
            let manual = selections.get(&row.row_index);

            if manual.is_none() && class != StatusClass::Resolved {
                continue;
            }

            let after = manual.cloned().unwrap_or_else(|| {
                pick_final_path(row).unwrap_or_else(|| row.original_path().to_string())
            });
            let candidates = parse_candidates(row.notes());

            let resolved = ResolvedRow {
                row: ViewRow {
                    playlist: playlist.to_path_buf(),
                    key: key.clone(),
                    row_index: row.row_index.clone(),
                    display: row.display().to_string(),
                    original_path: row.original_path().to_string(),
                    notes: row.notes().to_string(),
                    candidates: candidates.clone(),
                    pending_selection: None,
                },
                source: if manual.is_some() {
                    SelectionSource::Manual
                } else {
                    SelectionSource::Auto
                },
                after,
                status: row.status().to_string(),
            };

            let ambiguous_like = match class {
                StatusClass::Ambiguous => true,
                StatusClass::Failed => false,
                _ => candidates.len() >= 2,
            };
            if ambiguous_like {
                view.ambiguous_like.push(resolved);
            } else {
                view.failed_like.push(resolved);
            }
        }
        view
    }
}

/// The path the final playlist gets for one report row. Strict precedence:
/// manual selection, then (for resolved rows) the final-column whitelist,
/// then the original path unchanged.
pub fn resolve_final_path(row: &RawRow, selections: &SelectionMap) -> String {
    if let Some(chosen) = selections.get(&row.row_index) {
        return chosen.clone();
    }
    if classify_status(row.status()) == StatusClass::Resolved {
        return pick_final_path(row).unwrap_or_else(|| row.original_path().to_string());
    }
    row.original_path().to_string()
}

/// Render the final playlist: `#EXTM3U`, then per row the reconstructed
/// EXTINF line (when the report kept a usable duration) and the resolved
/// path.
pub fn final_playlist_lines(rows: &[RawRow], selections: &SelectionMap) -> Vec<String> {
    let mut lines = vec!["#EXTM3U".to_string()];
    for row in rows {
        if let Some(duration) = row.extinf_duration() {
            lines.push(format_extinf(duration, row.display()));
        }
        lines.push(resolve_final_path(row, selections));
    }
    lines
}
