//! Active-preset resync against a real home directory.

use std::fs;

use lumen_apply::{apply, resync, snapshot, ApplyOptions};
use lumen_core::types::{Preset, PresetId};
use lumen_core::{Context, Settings};
use tempfile::TempDir;

fn context(home: &TempDir) -> Context {
    let mut settings = Settings::defaults_for(home.path());
    settings.config_path = home.path().join("sunshine.conf");
    Context::new(home.path(), settings)
}

fn presets() -> Vec<Preset> {
    let a = Preset::new("a", "A");
    let mut b = Preset::new("b", "B");
    b.display.fps = 120;
    let a_twin = Preset::new("a-twin", "A twin");
    vec![a, b, a_twin]
}

#[test]
fn resync_adopts_the_single_match_and_exports_snapshots() {
    let home = TempDir::new().expect("home");
    let ctx = context(&home);
    fs::write(ctx.store.path(), "fps = 1\n").expect("write");
    let presets = presets();

    apply(&ctx.store, &presets[1], &ApplyOptions::default()).expect("apply");
    let outcome = resync(&ctx, &presets).expect("resync");

    assert!(outcome.config_found);
    assert_eq!(outcome.active, Some("b".into()));
    assert!(outcome.changed());

    let export_dir = ctx.export_dir();
    assert_eq!(snapshot::read_active(&export_dir).unwrap(), Some("b".into()));
    let config = snapshot::read_config(&export_dir).unwrap().expect("config export");
    assert_eq!(config.values.get("fps").map(String::as_str), Some("120"));
    assert!(snapshot::presets_path(&export_dir).exists());
}

#[test]
fn resync_keeps_previous_choice_among_twins() {
    let home = TempDir::new().expect("home");
    let ctx = context(&home);
    fs::write(ctx.store.path(), "").expect("write");
    let presets = presets();

    snapshot::write_active(&ctx.export_dir(), Some(&"a-twin".into())).expect("seed");
    let outcome = resync(&ctx, &presets).expect("resync");

    assert_eq!(outcome.matches, vec![PresetId::from("a"), PresetId::from("a-twin")]);
    assert_eq!(outcome.active, Some("a-twin".into()));
    assert!(!outcome.changed());
}

#[test]
fn resync_clears_active_when_nothing_matches() {
    let home = TempDir::new().expect("home");
    let ctx = context(&home);
    fs::write(ctx.store.path(), "fps = 75\n").expect("write");

    snapshot::write_active(&ctx.export_dir(), Some(&"a".into())).expect("seed");
    let outcome = resync(&ctx, &presets()).expect("resync");

    assert_eq!(outcome.active, None);
    assert_eq!(snapshot::read_active(&ctx.export_dir()).unwrap(), None);
}

#[test]
fn resync_without_config_file_degrades_to_no_active() {
    let home = TempDir::new().expect("home");
    let ctx = context(&home);

    let outcome = resync(&ctx, &presets()).expect("resync");

    assert!(!outcome.config_found);
    assert_eq!(outcome.active, None);
    assert!(snapshot::read_config(&ctx.export_dir()).unwrap().is_none());
}

#[test]
fn resync_recovers_from_a_corrupt_active_export() {
    let home = TempDir::new().expect("home");
    let ctx = context(&home);
    fs::write(ctx.store.path(), "fps = 120\n").expect("write");
    let export_dir = ctx.export_dir();
    fs::create_dir_all(&export_dir).expect("export dir");
    fs::write(snapshot::active_path(&export_dir), "{truncated").expect("corrupt export");

    let outcome = resync(&ctx, &presets()).expect("resync");

    assert_eq!(outcome.previous, None);
    assert_eq!(outcome.active, Some("b".into()));
    assert_eq!(snapshot::read_active(&export_dir).unwrap(), Some("b".into()));
}
