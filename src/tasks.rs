//! Batch orchestration for the three long-running operations: scan,
//! repair, export. Progress and cancellation are coarse-grained: once per
//! root or per playlist, checked cooperatively between units of work. On
//! cancellation everything completed so far is discarded; no partial
//! snapshot is committed.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Paths;
use crate::index::{self, DurationBuckets, IndexEntry, ScanStats};
use crate::normalize::canonical_key;
use crate::reconcile::{final_playlist_lines, ReconciliationContext};
use crate::repair::{repair_playlist, RepairSummary};
use crate::report::{read_report, write_report};
use crate::scanner::scan_root;
use crate::{playlist, Error, Result};

/// Progress/cancellation hooks threaded through a batch operation. Both
/// are optional; the engines run fine headless.
#[derive(Default)]
pub struct TaskHooks<'a> {
    pub progress: Option<&'a mut dyn FnMut(u8, &str)>,
    pub cancel: Option<&'a dyn Fn() -> bool>,
}

impl<'a> TaskHooks<'a> {
    fn report(&mut self, percent: u8, message: &str) {
        if let Some(progress) = self.progress.as_mut() {
            progress(percent, message);
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(cancel) if cancel() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub stats: ScanStats,
    pub index_path: PathBuf,
    pub stats_path: PathBuf,
}

/// Scan all roots sequentially, then commit the index and stats snapshots.
/// Cancellation between roots discards everything scanned so far.
pub fn scan_index(roots: &[PathBuf], paths: &Paths, hooks: &mut TaskHooks) -> Result<ScanOutcome> {
    let total = roots.len().max(1);
    let mut entries: Vec<IndexEntry> = Vec::new();
    let mut stats = ScanStats::default();

    hooks.report(0, "Scanning…");
    for (i, root) in roots.iter().enumerate() {
        hooks.check_cancelled()?;
        hooks.report(
            (i * 100 / total) as u8,
            &format!("Scanning: {} | indexed so far: {}", root.display(), entries.len()),
        );

        let scan = scan_root(root);
        info!(
            root = %root.display(),
            scanned = scan.stats.scanned_supported,
            skipped = scan.stats.skipped_no_duration,
            indexed = scan.entries.len(),
            "root scanned"
        );
        entries.extend(scan.entries);
        stats.absorb(scan.stats);
    }
    stats.indexed = entries.len() as u64;

    let index_path = paths.index_path();
    let stats_path = paths.stats_path();
    index::save_index(&index_path, &entries)?;
    index::save_stats(&stats_path, &stats)?;

    hooks.report(100, &format!("Scan complete. Indexed: {}", stats.indexed));
    Ok(ScanOutcome {
        stats,
        index_path,
        stats_path,
    })
}

#[derive(Debug)]
pub struct PlaylistRepairResult {
    pub playlist: PathBuf,
    pub key: String,
    pub report_path: PathBuf,
    pub summary: RepairSummary,
}

#[derive(Debug, Default)]
pub struct RepairBatchOutcome {
    pub results: Vec<PlaylistRepairResult>,
    /// Playlists that could not be processed, with the reason. A failure
    /// here never aborts the rest of the batch.
    pub failures: Vec<(PathBuf, String)>,
}

impl RepairBatchOutcome {
    pub fn totals(&self) -> RepairSummary {
        let mut totals = RepairSummary::default();
        for r in &self.results {
            totals.total += r.summary.total;
            totals.kept += r.summary.kept;
            totals.repaired += r.summary.repaired;
            totals.ambiguous += r.summary.ambiguous;
            totals.failed += r.summary.failed;
        }
        totals
    }
}

/// Repair a batch of playlists against the persisted index. Writes one
/// report per playlist; the rewritten playlist itself is only a transient
/// working copy and is deleted after the report is committed.
pub fn repair_playlists(
    playlists: &[PathBuf],
    paths: &Paths,
    tolerance: u32,
    ctx: &mut ReconciliationContext,
    hooks: &mut TaskHooks,
) -> Result<RepairBatchOutcome> {
    let entries = index::load_index(&paths.index_path())?;
    let buckets = DurationBuckets::build(&entries);
    info!(entries = entries.len(), matchable = buckets.len(), "index loaded");

    let mut outcome = RepairBatchOutcome::default();
    let total = playlists.len().max(1);

    for (i, playlist_path) in playlists.iter().enumerate() {
        hooks.check_cancelled()?;
        let name = playlist_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        hooks.report((i * 100 / total) as u8, &format!("Repairing: {name}"));

        let key = canonical_key(playlist_path);
        let report_path = paths.report_path(&key);
        let tmp_path = paths.tmp_playlist_path(&key);

        let result = repair_one(playlist_path, &buckets, tolerance, &report_path, &tmp_path);

        // The tmp working copy is never a deliverable; failing to remove
        // it must not disturb the result we already have.
        if tmp_path.exists() {
            if let Err(e) = fs::remove_file(&tmp_path) {
                warn!(path = %tmp_path.display(), error = %e, "could not remove tmp playlist");
            }
        }

        match result {
            Ok(summary) => {
                ctx.mark_repaired(&key);
                outcome.results.push(PlaylistRepairResult {
                    playlist: playlist_path.clone(),
                    key,
                    report_path,
                    summary,
                });
            }
            Err(e) => {
                warn!(playlist = %playlist_path.display(), error = %e, "repair failed");
                outcome.failures.push((playlist_path.clone(), e.to_string()));
            }
        }
    }

    hooks.report(100, "Repair complete.");
    Ok(outcome)
}

fn repair_one(
    playlist_path: &Path,
    buckets: &DurationBuckets,
    tolerance: u32,
    report_path: &Path,
    tmp_path: &Path,
) -> Result<RepairSummary> {
    let out = repair_playlist(playlist_path, buckets, tolerance)?;
    playlist::write_lines(tmp_path, &out.lines)?;
    write_report(report_path, &out.rows)?;
    Ok(out.summary)
}

#[derive(Debug, Default)]
pub struct ExportOutcome {
    pub written: Vec<PathBuf>,
    pub skipped_no_report: Vec<PathBuf>,
}

/// Write the final playlists for a batch, honoring the context's selection
/// precedence. Playlists without a report are skipped; if nothing at all
/// has a report, that is a precondition error.
pub fn export_selected(
    playlists: &[PathBuf],
    paths: &Paths,
    ctx: &ReconciliationContext,
    hooks: &mut TaskHooks,
) -> Result<ExportOutcome> {
    let mut outcome = ExportOutcome::default();
    let total = playlists.len().max(1);

    for (i, playlist_path) in playlists.iter().enumerate() {
        hooks.check_cancelled()?;

        let key = canonical_key(playlist_path);
        let report_path = paths.report_path(&key);
        if !report_path.exists() {
            outcome.skipped_no_report.push(playlist_path.clone());
            continue;
        }

        let out_path = paths.export_path(&key);
        hooks.report(
            (i * 100 / total) as u8,
            &format!("Saving: {}", out_path.file_name().unwrap_or_default().to_string_lossy()),
        );

        let rows = read_report(&report_path)?;
        let selections = ctx.effective_selections(playlist_path);
        let lines = final_playlist_lines(&rows, &selections);
        playlist::write_lines(&out_path, &lines)?;

        info!(playlist = %out_path.display(), rows = rows.len(), "final playlist written");
        outcome.written.push(out_path);
    }

    if outcome.written.is_empty() {
        if let Some(first) = playlists.first() {
            return Err(Error::MissingReport(paths.report_path(&canonical_key(first))));
        }
    }

    hooks.report(100, "Save complete.");
    Ok(outcome)
}
