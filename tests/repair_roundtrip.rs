//! End-to-end: scan a real (tiny) WAV library, repair a playlist against
//! the index, pick a winner for the ambiguous row, and export the final
//! playlist.

use std::fs;
use std::path::{Path, PathBuf};

use lofty::config::WriteOptions;
use lofty::tag::{Accessor, Tag, TagExt, TagType};

use reprise::config::Paths;
use reprise::index::MetaSource;
use reprise::normalize::canonical_key;
use reprise::reconcile::ReconciliationContext;
use reprise::report::read_report;
use reprise::tasks::{self, TaskHooks};

const SAMPLE_RATE: u32 = 8000;

/// Write a 16-bit mono PCM WAV of `seconds` seconds of silence.
fn write_wav(path: &Path, seconds: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    let data_len = SAMPLE_RATE * 2 * seconds;
    let byte_rate = SAMPLE_RATE * 2;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
    bytes.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);

    fs::write(path, bytes).unwrap();
}

fn write_tagged_wav(path: &Path, seconds: u32, title: &str, artist: &str) {
    write_wav(path, seconds);

    let mut tag = Tag::new(TagType::RiffInfo);
    tag.set_title(title.to_string());
    tag.set_artist(artist.to_string());
    tag.save_to_path(path, WriteOptions::default()).unwrap();
}

struct Fixture {
    _dir: tempfile::TempDir,
    paths: Paths,
    karma: PathBuf,
    dup_a: PathBuf,
    dup_b: PathBuf,
    playlist: PathBuf,
}

fn build_fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("library");

    let karma = lib.join("Radiohead/OK Computer/02 - Karma Police.wav");
    write_tagged_wav(&karma, 120, "Karma Police", "Radiohead");

    let dup_a = lib.join("rips/a/Common Song.wav");
    let dup_b = lib.join("rips/b/Common Song.wav");
    write_tagged_wav(&dup_a, 90, "Common Song", "The Band");
    write_tagged_wav(&dup_b, 90, "Common Song", "The Band");

    write_wav(&lib.join("loose/03 - Mystery Tune.wav"), 60);

    // supported extension, not actually audio
    let garbage = lib.join("bad/corrupt.wav");
    fs::create_dir_all(garbage.parent().unwrap()).unwrap();
    fs::write(&garbage, b"this is not a wav file at all").unwrap();

    let playlist = dir.path().join("15.m3u");
    let lines = [
        "#EXTM3U".to_string(),
        "#EXTINF:120,Radiohead - Karma Police".to_string(),
        "/gone/karma.wav".to_string(),
        "#EXTINF:90,The Band - Common Song".to_string(),
        "/gone/common.wav".to_string(),
        "#EXTINF:120,Radiohead - Karma Police".to_string(),
        karma.display().to_string(),
        "#EXTINF:100,Nobody - No Such Song".to_string(),
        "/gone/nothing.wav".to_string(),
        "#EXTINF:-1,Some Stream".to_string(),
        "/gone/stream.wav".to_string(),
    ];
    fs::write(&playlist, lines.join("\n")).unwrap();

    let paths = Paths::rooted(dir.path().join("data"));

    Fixture {
        _dir: dir,
        paths,
        karma,
        dup_a,
        dup_b,
        playlist,
    }
}

fn scan(fixture: &Fixture) -> reprise::tasks::ScanOutcome {
    let lib_root = fixture.karma.ancestors().nth(3).unwrap().to_path_buf();
    tasks::scan_index(&[lib_root], &fixture.paths, &mut TaskHooks::default()).unwrap()
}

#[test]
fn scan_indexes_through_the_tag_tiers() {
    let fixture = build_fixture();
    let outcome = scan(&fixture);

    assert_eq!(outcome.stats.scanned_supported, 5);
    assert_eq!(outcome.stats.skipped_no_duration, 1);
    assert_eq!(outcome.stats.indexed, 4);
    assert!(outcome.stats.skipped_roots.is_empty());

    let entries = reprise::index::load_index(&outcome.index_path).unwrap();
    assert_eq!(entries.len(), 4);

    let karma = entries
        .iter()
        .find(|e| e.path == fixture.karma)
        .expect("karma police indexed");
    assert_eq!(karma.duration, 120);
    assert_eq!(karma.title, "Karma Police");
    assert_eq!(karma.artist.as_deref(), Some("Radiohead"));
    assert_eq!(karma.meta_source, MetaSource::EasyTag);

    let mystery = entries
        .iter()
        .find(|e| e.title == "Mystery Tune")
        .expect("untagged file indexed via filename tier");
    assert_eq!(mystery.duration, 60);
    assert_eq!(mystery.artist.as_deref(), Some("loose"));
    assert_eq!(mystery.meta_source, MetaSource::PathGuess);
}

#[test]
fn repair_classifies_every_unit() {
    let fixture = build_fixture();
    scan(&fixture);

    let mut ctx = ReconciliationContext::new(fixture.paths.reports_dir());
    let outcome = tasks::repair_playlists(
        &[fixture.playlist.clone()],
        &fixture.paths,
        2,
        &mut ctx,
        &mut TaskHooks::default(),
    )
    .unwrap();

    assert!(outcome.failures.is_empty());
    let summary = &outcome.results[0].summary;
    assert_eq!(summary.total, 5);
    assert_eq!(summary.kept, 1);
    assert_eq!(summary.repaired, 1);
    assert_eq!(summary.ambiguous, 1);
    assert_eq!(summary.failed, 2); // FAILED + FAILED_NO_EXTINF

    let rows = read_report(&outcome.results[0].report_path).unwrap();
    assert_eq!(rows[0].status(), "REPAIRED");
    assert_eq!(rows[0].get("written_path"), Some(fixture.karma.to_str().unwrap()));
    assert_eq!(rows[1].status(), "AMBIGUOUS");
    assert_eq!(rows[2].status(), "KEPT");
    assert_eq!(rows[3].status(), "FAILED");
    assert_eq!(rows[4].status(), "FAILED_NO_EXTINF");

    // tmp working copy is gone
    assert!(!fixture.paths.tmp_playlist_path("15").exists());
}

#[test]
fn repairing_a_playlist_of_existing_paths_keeps_everything() {
    let fixture = build_fixture();
    scan(&fixture);

    let all_good = fixture.playlist.parent().unwrap().join("good.m3u");
    let lines = [
        "#EXTM3U".to_string(),
        "#EXTINF:120,Radiohead - Karma Police".to_string(),
        fixture.karma.display().to_string(),
        "#EXTINF:90,The Band - Common Song".to_string(),
        fixture.dup_a.display().to_string(),
    ];
    fs::write(&all_good, lines.join("\n")).unwrap();

    let mut ctx = ReconciliationContext::new(fixture.paths.reports_dir());
    let outcome = tasks::repair_playlists(
        &[all_good],
        &fixture.paths,
        2,
        &mut ctx,
        &mut TaskHooks::default(),
    )
    .unwrap();

    let summary = &outcome.results[0].summary;
    assert_eq!(summary.kept, 2);
    assert_eq!(summary.repaired + summary.ambiguous + summary.failed, 0);
}

#[test]
fn select_and_export_produce_the_final_playlist() {
    let fixture = build_fixture();
    scan(&fixture);

    let mut ctx = ReconciliationContext::new(fixture.paths.reports_dir());
    tasks::repair_playlists(
        &[fixture.playlist.clone()],
        &fixture.paths,
        2,
        &mut ctx,
        &mut TaskHooks::default(),
    )
    .unwrap();

    let key = canonical_key(&fixture.playlist);
    let rows = read_report(&fixture.paths.report_path(&key)).unwrap();

    // the ambiguous row offers both duplicates; the user picks one
    let unresolved = ctx.unresolved_view(&fixture.playlist, &rows);
    assert_eq!(unresolved.ambiguous.len(), 1);
    let amb = &unresolved.ambiguous[0];
    assert_eq!(amb.candidates.len(), 2);
    assert!(amb
        .candidates
        .contains(&fixture.dup_a.display().to_string()));
    assert!(amb
        .candidates
        .contains(&fixture.dup_b.display().to_string()));

    ctx.apply_selection(&key, &amb.row_index, fixture.dup_a.display().to_string());
    ctx.save_selections(&key).unwrap();

    let export = tasks::export_selected(
        &[fixture.playlist.clone()],
        &fixture.paths,
        &ctx,
        &mut TaskHooks::default(),
    )
    .unwrap();
    assert_eq!(export.written.len(), 1);
    let out_path = &export.written[0];
    assert_eq!(canonical_key(out_path), key);

    let text = fs::read_to_string(out_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "#EXTM3U");
    // repaired row resolved to the library file
    assert!(lines.contains(&fixture.karma.to_str().unwrap()));
    // ambiguous row resolved to the manual selection, not left broken
    assert!(lines.contains(&fixture.dup_a.to_str().unwrap()));
    assert!(!lines.contains(&"/gone/common.wav"));
    // failed rows keep their original paths
    assert!(lines.contains(&"/gone/nothing.wav"));
    assert!(lines.contains(&"/gone/stream.wav"));
}

#[test]
fn saved_selections_survive_into_a_new_session() {
    let fixture = build_fixture();
    scan(&fixture);

    let mut ctx = ReconciliationContext::new(fixture.paths.reports_dir());
    tasks::repair_playlists(
        &[fixture.playlist.clone()],
        &fixture.paths,
        2,
        &mut ctx,
        &mut TaskHooks::default(),
    )
    .unwrap();

    let key = canonical_key(&fixture.playlist);
    ctx.apply_selection(&key, "1", fixture.dup_b.display().to_string());
    ctx.save_selections(&key).unwrap();

    // a brand new session (fresh process): adopt the saved selections for
    // an explicitly requested export
    let mut ctx = ReconciliationContext::new(fixture.paths.reports_dir());
    ctx.mark_repaired(&key);
    ctx.adopt_persisted(&key);

    let export = tasks::export_selected(
        &[fixture.playlist.clone()],
        &fixture.paths,
        &ctx,
        &mut TaskHooks::default(),
    )
    .unwrap();

    let text = fs::read_to_string(&export.written[0]).unwrap();
    assert!(text.lines().any(|l| l == fixture.dup_b.to_str().unwrap()));

    // re-importing the exported playlist hides the settled row
    let rows = read_report(&fixture.paths.report_path(&key)).unwrap();
    let exported_playlist = export.written[0].clone();
    let view = ReconciliationContext::new(fixture.paths.reports_dir())
        .unresolved_view(&exported_playlist, &rows);
    assert!(view.ambiguous.is_empty());
}
