use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const LIVE_CONFIG: &str = "\
# streaming daemon config
sunshine_name = den-pc
port = 47989
fps = 30
min_log_level = debug
";

const TV_PRESET: &str = "\
id: tv
name: Living room TV
display:
  fps: 120
  bitrate: 50
network:
  upnp: true
";

fn lumen_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lumen"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("RUST_LOG", "warn")
        .env("NO_COLOR", "1");
    cmd
}

/// A home whose settings point at a config file inside it and at a daemon
/// process name that never exists.
fn setup_home() -> (TempDir, PathBuf) {
    let home = TempDir::new().expect("home");
    let config = home.path().join("sunshine.conf");
    fs::write(&config, LIVE_CONFIG).expect("write config");

    let lumen = home.path().join(".lumen");
    fs::create_dir_all(&lumen).expect("create .lumen");
    fs::write(
        lumen.join("settings.yaml"),
        format!(
            "config_path: {}\nprocess_name: lumen-test-no-such-daemon\nstart_command: [\"true\"]\n",
            config.display()
        ),
    )
    .expect("write settings");
    (home, config)
}

fn add_tv_preset(home: &Path) {
    let file = home.join("tv.yaml");
    fs::write(&file, TV_PRESET).expect("write preset file");
    lumen_cmd(home)
        .args(["preset", "add"])
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("Added preset 'tv'"));
}

// ---------------------------------------------------------------------------
// preset
// ---------------------------------------------------------------------------

#[test]
fn preset_list_seeds_the_default_preset() {
    let (home, _) = setup_home();
    lumen_cmd(home.path())
        .args(["preset", "list"])
        .assert()
        .success()
        .stdout(contains("default").and(contains("yes")));
}

#[test]
fn preset_add_rejects_duplicates_and_remove_rejects_read_only() {
    let (home, _) = setup_home();
    add_tv_preset(home.path());

    lumen_cmd(home.path())
        .args(["preset", "add"])
        .arg(home.path().join("tv.yaml"))
        .assert()
        .failure()
        .stderr(contains("tv"));

    lumen_cmd(home.path())
        .args(["preset", "remove", "default"])
        .assert()
        .failure();

    lumen_cmd(home.path())
        .args(["preset", "show", "tv"])
        .assert()
        .success()
        .stdout(contains("fps: 120"));

    lumen_cmd(home.path())
        .args(["preset", "remove", "tv"])
        .assert()
        .success();
    lumen_cmd(home.path())
        .args(["preset", "show", "tv"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// diff / apply / check
// ---------------------------------------------------------------------------

#[test]
fn diff_shows_pending_changes_without_writing() {
    let (home, config) = setup_home();
    add_tv_preset(home.path());

    lumen_cmd(home.path())
        .args(["diff", "tv"])
        .assert()
        .success()
        .stdout(contains("-fps = 30").and(contains("+fps = 120")));

    assert_eq!(fs::read_to_string(config).unwrap(), LIVE_CONFIG);
}

#[test]
fn dry_run_apply_reports_and_writes_nothing() {
    let (home, config) = setup_home();
    add_tv_preset(home.path());

    lumen_cmd(home.path())
        .args(["apply", "tv", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run]").and(contains("fps = 120")));

    assert_eq!(fs::read_to_string(&config).unwrap(), LIVE_CONFIG);
    let backups = fs::read_dir(home.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".backup."))
        .count();
    assert_eq!(backups, 0, "dry run must not back up");
}

#[test]
fn apply_without_restart_writes_config_and_tracks_active_preset() {
    let (home, config) = setup_home();
    add_tv_preset(home.path());

    lumen_cmd(home.path())
        .args(["apply", "tv", "--no-restart"])
        .assert()
        .success()
        .stdout(contains("applied").and(contains("active preset: tv")));

    let written = fs::read_to_string(&config).unwrap();
    assert!(written.contains("fps = 120"), "{written}");
    assert!(written.contains("port = 47989"), "protected key lost: {written}");
    assert!(written.starts_with("# streaming daemon config"), "comment lost: {written}");
    assert!(!written.contains("min_log_level"), "expert key not flushed: {written}");

    lumen_cmd(home.path())
        .args(["check", "tv"])
        .assert()
        .success()
        .stdout(contains("matches"));

    lumen_cmd(home.path())
        .args(["check", "default"])
        .assert()
        .failure()
        .stdout(contains("display.fps"));

    let output = lumen_cmd(home.path())
        .args(["status", "--json"])
        .output()
        .expect("run status");
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).expect("status json");
    assert_eq!(status["activePresetId"], "tv");
    assert_eq!(status["configFound"], true);
    assert_eq!(status["backups"], 1);
    assert_eq!(status["sessionMarker"], false);
}

#[test]
fn applying_twice_changes_nothing_the_second_time() {
    let (home, config) = setup_home();
    add_tv_preset(home.path());

    lumen_cmd(home.path())
        .args(["apply", "tv", "--no-restart"])
        .assert()
        .success();
    let first = fs::read_to_string(&config).unwrap();

    lumen_cmd(home.path())
        .args(["apply", "tv", "--no-restart"])
        .assert()
        .success()
        .stdout(contains("already up to date"));
    assert_eq!(fs::read_to_string(&config).unwrap(), first);
}

// ---------------------------------------------------------------------------
// backup / recover / status
// ---------------------------------------------------------------------------

#[test]
fn backup_create_list_restore() {
    let (home, config) = setup_home();

    lumen_cmd(home.path())
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(contains("No backups"));

    lumen_cmd(home.path())
        .args(["backup", "create"])
        .assert()
        .success()
        .stdout(contains("sunshine.conf.backup."));

    fs::write(&config, "fps = 1\n").unwrap();
    lumen_cmd(home.path())
        .args(["backup", "restore"])
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&config).unwrap(), LIVE_CONFIG);
}

#[test]
fn restore_without_backups_fails() {
    let (home, _) = setup_home();
    lumen_cmd(home.path())
        .args(["backup", "restore"])
        .assert()
        .failure()
        .stderr(contains("restore failed"));
}

#[test]
fn recover_consumes_an_orphaned_marker() {
    let (home, _) = setup_home();
    let marker = home.path().join(".lumen").join("run").join("session-marker.json");
    fs::create_dir_all(marker.parent().unwrap()).unwrap();
    fs::write(
        &marker,
        r#"{"vddWasEnabled": [], "disabledDisplays": ["DISPLAY2"], "displayMode": "focus"}"#,
    )
    .unwrap();

    lumen_cmd(home.path())
        .arg("recover")
        .assert()
        .success()
        .stdout(
            contains("enable DISPLAY2")
                .and(contains("Recovery incomplete"))
                .and(contains("session marker removed")),
        );
    assert!(!marker.exists());

    lumen_cmd(home.path())
        .arg("recover")
        .assert()
        .success()
        .stdout(contains("nothing to recover"));
}

// ---------------------------------------------------------------------------
// daemon
// ---------------------------------------------------------------------------

#[test]
fn stopping_a_stopped_daemon_leaves_no_user_stop_flag() {
    let (home, _) = setup_home();
    let flag = home.path().join(".lumen").join("run").join("user-stop");

    let output = lumen_cmd(home.path())
        .args(["daemon", "stop"])
        .output()
        .expect("run daemon stop");
    if output.status.success() {
        assert!(String::from_utf8_lossy(&output.stdout).contains("already stopped"));
    }
    assert!(!flag.exists(), "user-stop flag left behind by a no-op stop");
}

#[test]
fn status_reports_offline_daemon_and_missing_config() {
    let (home, config) = setup_home();
    fs::remove_file(&config).unwrap();

    let output = lumen_cmd(home.path())
        .args(["status", "--json"])
        .output()
        .expect("run status");
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).expect("status json");
    assert!(
        status["status"] == "OFFLINE" || status["status"] == "UNKNOWN",
        "{status}"
    );
    assert_eq!(status["configFound"], false);
    assert_eq!(status["activePresetId"], serde_json::Value::Null);
}
