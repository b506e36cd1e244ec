//! The per-line repair pass: walk a playlist, decide the fate of every
//! EXTINF unit against the index, and produce the rewritten line sequence
//! plus one report row per unit.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::index::DurationBuckets;
use crate::matching::{candidate_pairs, find_matches};
use crate::playlist::{is_extinf_line, parse_extinf, read_lines};
use crate::Result;

/// How many candidate paths an AMBIGUOUS row records in its notes.
const MAX_NOTED_CANDIDATES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStatus {
    Kept,
    Repaired,
    Ambiguous,
    Failed,
    /// The unit had no usable duration or display text, so matching was
    /// never attempted. Distinct from `Failed` so operators can tell
    /// "couldn't try" from "tried and lost".
    FailedNoExtinf,
}

impl RepairStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStatus::Kept => "KEPT",
            RepairStatus::Repaired => "REPAIRED",
            RepairStatus::Ambiguous => "AMBIGUOUS",
            RepairStatus::Failed => "FAILED",
            RepairStatus::FailedNoExtinf => "FAILED_NO_EXTINF",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportRow {
    pub status: RepairStatus,
    pub extinf_duration: Option<i64>,
    pub extinf_display: String,
    pub original_path: String,
    /// Best-known resolved path; meaningful for KEPT/REPAIRED only.
    pub written_path: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default)]
pub struct RepairSummary {
    pub total: u64,
    pub kept: u64,
    pub repaired: u64,
    pub ambiguous: u64,
    pub failed: u64,
}

#[derive(Debug)]
pub struct RepairOutcome {
    /// The rewritten playlist lines (the transient working copy).
    pub lines: Vec<String>,
    pub rows: Vec<ReportRow>,
    pub summary: RepairSummary,
}

/// Repair one playlist against a pre-built duration index.
///
/// Line consumption: non-EXTINF lines pass through one at a time; an
/// EXTINF line with a following line forms a two-line unit. An EXTINF
/// line at end-of-file has no path line and passes through unprocessed.
pub fn repair_playlist(
    playlist: &Path,
    buckets: &DurationBuckets,
    tolerance: u32,
) -> Result<RepairOutcome> {
    let lines = read_lines(playlist)?;

    let mut out_lines: Vec<String> = Vec::with_capacity(lines.len());
    let mut rows: Vec<ReportRow> = Vec::new();
    let mut summary = RepairSummary::default();

    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        out_lines.push(line.clone());

        if !(is_extinf_line(line) && i + 1 < lines.len()) {
            i += 1;
            continue;
        }

        summary.total += 1;
        let extinf = parse_extinf(line);
        let original_path = lines[i + 1].clone();

        let (duration, display) = match &extinf {
            Some(e) => (Some(e.duration), e.display.clone()),
            None => (None, String::new()),
        };

        if Path::new(&original_path).exists() {
            out_lines.push(original_path.clone());
            summary.kept += 1;
            rows.push(ReportRow {
                status: RepairStatus::Kept,
                extinf_duration: duration,
                extinf_display: display,
                original_path: original_path.clone(),
                written_path: original_path,
                notes: String::new(),
            });
            i += 2;
            continue;
        }

        // Without both a non-negative duration and display text there is
        // nothing to match on.
        let usable = matches!(duration, Some(d) if d >= 0) && !display.is_empty();
        if !usable {
            out_lines.push(original_path.clone());
            summary.failed += 1;
            rows.push(ReportRow {
                status: RepairStatus::FailedNoExtinf,
                extinf_duration: duration,
                extinf_display: display,
                original_path: original_path.clone(),
                written_path: original_path,
                notes: "no duration or display".into(),
            });
            i += 2;
            continue;
        }

        let duration_secs = duration.unwrap_or(0) as u32;
        let matches = collect_matches(&display, duration_secs, buckets, tolerance);

        match matches.len() {
            1 => {
                let new_path = matches[0].display().to_string();
                debug!(from = %original_path, to = %new_path, "repaired");
                out_lines.push(new_path.clone());
                summary.repaired += 1;
                rows.push(ReportRow {
                    status: RepairStatus::Repaired,
                    extinf_duration: duration,
                    extinf_display: display,
                    original_path,
                    written_path: new_path,
                    notes: String::new(),
                });
            }
            0 => {
                out_lines.push(original_path.clone());
                summary.failed += 1;
                rows.push(ReportRow {
                    status: RepairStatus::Failed,
                    extinf_duration: duration,
                    extinf_display: display,
                    original_path: original_path.clone(),
                    written_path: original_path,
                    notes: "no match".into(),
                });
            }
            _ => {
                out_lines.push(original_path.clone());
                summary.ambiguous += 1;
                let noted = matches
                    .iter()
                    .take(MAX_NOTED_CANDIDATES)
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" | ");
                rows.push(ReportRow {
                    status: RepairStatus::Ambiguous,
                    extinf_duration: duration,
                    extinf_display: display,
                    original_path: original_path.clone(),
                    written_path: original_path,
                    notes: format!("candidates: {noted}"),
                });
            }
        }

        i += 2;
    }

    info!(
        playlist = %playlist.display(),
        total = summary.total,
        kept = summary.kept,
        repaired = summary.repaired,
        ambiguous = summary.ambiguous,
        failed = summary.failed,
        "repair pass complete"
    );

    Ok(RepairOutcome {
        lines: out_lines,
        rows,
        summary,
    })
}

/// Run the matcher over every (title, artist) orientation of the display,
/// accumulating matches deduplicated by path. If no orientation matched,
/// retry them all title-only.
fn collect_matches(
    display: &str,
    duration: u32,
    buckets: &DurationBuckets,
    tolerance: u32,
) -> Vec<PathBuf> {
    let pairs = candidate_pairs(display);

    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut accumulated: Vec<PathBuf> = Vec::new();

    for (title, artist) in &pairs {
        for entry in find_matches(title, artist.as_deref(), duration, buckets, tolerance) {
            if seen.insert(entry.path.clone()) {
                accumulated.push(entry.path.clone());
            }
        }
    }

    if accumulated.is_empty() {
        for (title, _) in &pairs {
            for entry in find_matches(title, None, duration, buckets, tolerance) {
                if seen.insert(entry.path.clone()) {
                    accumulated.push(entry.path.clone());
                }
            }
        }
    }

    accumulated
}
