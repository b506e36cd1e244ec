use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reprise::cli::{Cli, Commands};
use reprise::config::{AppConfig, Paths};
use reprise::normalize::canonical_key;
use reprise::reconcile::{ReconciliationContext, ResolvedView, SelectionSource, UnresolvedView};
use reprise::report::read_report;
use reprise::tasks::{self, TaskHooks};

fn main() -> Result<()> {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    let config = AppConfig::load();
    let paths = Paths::resolve(&config, cli.data_dir.as_deref());

    let _log_guard = init_logging(&paths, cli.verbose);

    match cli.command {
        Commands::Scan { roots } => {
            let roots = if roots.is_empty() {
                config.music_roots.clone()
            } else {
                roots
            };
            if roots.is_empty() {
                bail!("no roots given and no music_roots configured in config.toml");
            }

            let mut progress = progress_printer();
            let mut hooks = TaskHooks {
                progress: Some(&mut progress),
                cancel: None,
            };
            let outcome = tasks::scan_index(&roots, &paths, &mut hooks)?;

            println!("Indexed files     : {}", outcome.stats.indexed);
            println!("Supported scanned : {}", outcome.stats.scanned_supported);
            println!("Skipped (no dur.) : {}", outcome.stats.skipped_no_duration);
            if !outcome.stats.skipped_roots.is_empty() {
                println!("Skipped roots     : {}", outcome.stats.skipped_roots.join(", "));
            }
            println!("Index  : {}", outcome.index_path.display());
            println!("Stats  : {}", outcome.stats_path.display());
        }

        Commands::Repair {
            playlists,
            tolerance,
        } => {
            let tolerance = tolerance.unwrap_or(config.duration_tolerance);
            let mut ctx = ReconciliationContext::new(paths.reports_dir());

            let mut progress = progress_printer();
            let mut hooks = TaskHooks {
                progress: Some(&mut progress),
                cancel: None,
            };
            let outcome = tasks::repair_playlists(&playlists, &paths, tolerance, &mut ctx, &mut hooks)?;

            for result in &outcome.results {
                let s = &result.summary;
                println!(
                    "{}: total {} | kept {} | repaired {} | ambiguous {} | failed {}",
                    result.playlist.display(),
                    s.total,
                    s.kept,
                    s.repaired,
                    s.ambiguous,
                    s.failed
                );
            }
            for (playlist, reason) in &outcome.failures {
                eprintln!("FAILED {}: {}", playlist.display(), reason);
            }

            let totals = outcome.totals();
            println!(
                "Repair complete. Kept: {} | Repaired: {} | Ambiguous: {} | Failed: {}",
                totals.kept, totals.repaired, totals.ambiguous, totals.failed
            );
            println!("Reports: {}", paths.reports_dir().display());
            if totals.ambiguous + totals.failed > 0 {
                println!("Run `reprise status <playlist>` to review the remaining rows.");
            }
        }

        Commands::Status {
            playlists,
            resolved,
        } => {
            let mut ctx = ReconciliationContext::new(paths.reports_dir());

            for playlist in &playlists {
                let key = canonical_key(playlist);
                let report_path = paths.report_path(&key);
                if !report_path.exists() {
                    eprintln!("{}: no report (run `reprise repair` first)", playlist.display());
                    continue;
                }
                let rows = read_report(&report_path)
                    .with_context(|| format!("reading {}", report_path.display()))?;

                // Explicitly named on the command line counts as opening
                // the playlist's report on purpose.
                ctx.mark_repaired(&key);

                println!("== {} (key {key}) ==", playlist.display());
                if resolved {
                    print_resolved(&ctx.resolved_view(playlist, &rows));
                } else {
                    print_unresolved(&ctx.unresolved_view(playlist, &rows));
                }
            }
        }

        Commands::Select {
            playlist,
            row,
            file,
        } => {
            let key = canonical_key(&playlist);
            let report_path = paths.report_path(&key);
            if !report_path.exists() {
                bail!(
                    "no report for {} (expected {})",
                    playlist.display(),
                    report_path.display()
                );
            }
            if !file.exists() {
                eprintln!("warning: {} does not exist on disk", file.display());
            }

            let mut ctx = ReconciliationContext::new(paths.reports_dir());
            ctx.apply_selection(&key, &row.to_string(), file.display().to_string());
            let merged = ctx.save_selections(&key)?;

            println!(
                "Selected row {row} -> {} ({} selection(s) saved for key {key})",
                file.display(),
                merged.len()
            );
        }

        Commands::Export { playlists } => {
            let mut ctx = ReconciliationContext::new(paths.reports_dir());
            for playlist in &playlists {
                let key = canonical_key(playlist);
                ctx.mark_repaired(&key);
                // Selections saved by `reprise select` in an earlier run
                // belong to this export.
                ctx.adopt_persisted(&key);
            }

            let mut progress = progress_printer();
            let mut hooks = TaskHooks {
                progress: Some(&mut progress),
                cancel: None,
            };
            let outcome = tasks::export_selected(&playlists, &paths, &ctx, &mut hooks)?;

            for path in &outcome.written {
                println!("Wrote {}", path.display());
            }
            for playlist in &outcome.skipped_no_report {
                eprintln!("Skipped {} (no report)", playlist.display());
            }
        }
    }

    Ok(())
}

fn progress_printer() -> impl FnMut(u8, &str) {
    |percent, message| println!("[{percent:>3}%] {message}")
}

fn init_logging(paths: &Paths, verbosity: u8) -> tracing_appender::non_blocking::WorkerGuard {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let logs_dir = paths.logs_dir();
    let _ = std::fs::create_dir_all(&logs_dir);
    let file_appender = tracing_appender::rolling::daily(logs_dir, "reprise.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    guard
}

fn print_unresolved(view: &UnresolvedView) {
    if view.ambiguous.is_empty() && view.failed.is_empty() {
        println!("Nothing unresolved.");
        return;
    }

    for (label, rows) in [("AMBIGUOUS", &view.ambiguous), ("FAILED", &view.failed)] {
        if rows.is_empty() {
            continue;
        }
        println!("{label} ({}):", rows.len());
        for row in rows {
            println!("  [{}] {}", row.row_index, row.display);
            println!("      original: {}", row.original_path);
            if let Some(pending) = &row.pending_selection {
                println!("      pending : {pending}");
            }
            for (i, candidate) in row.candidates.iter().enumerate() {
                println!("      {}. {candidate}", i + 1);
            }
        }
    }
}

fn print_resolved(view: &ResolvedView) {
    if view.ambiguous_like.is_empty() && view.failed_like.is_empty() {
        println!("Nothing resolved yet.");
        return;
    }

    for (label, rows) in [
        ("Resolved (ambiguous)", &view.ambiguous_like),
        ("Resolved (other)", &view.failed_like),
    ] {
        if rows.is_empty() {
            continue;
        }
        println!("{label} ({}):", rows.len());
        for resolved in rows {
            let tag = match resolved.source {
                SelectionSource::Manual => "MANUAL",
                SelectionSource::Auto => "AUTO",
            };
            println!(
                "  [{}] {} -> {} [{}] (status={})",
                resolved.row.row_index, resolved.row.display, resolved.after, tag, resolved.status
            );
        }
    }
}
