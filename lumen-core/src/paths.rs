//! Filesystem layout under `<home>/.lumen/`.
//!
//! ```text
//! ~/.lumen/
//!   settings.yaml
//!   presets.yaml
//!   export/
//!     active-preset.json    (consumed by the session hooks)
//!     presets.json
//!     daemon-config.json
//!   run/
//!     session-marker.json   (written by the session-start hook)
//!     user-stop             (set before a user-initiated stop)
//!     lifecycle.lock        (held during start/stop/restart)
//! ```

use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.yaml";
pub const PRESETS_FILE: &str = "presets.yaml";
pub const ACTIVE_EXPORT_FILE: &str = "active-preset.json";
pub const PRESETS_EXPORT_FILE: &str = "presets.json";
pub const CONFIG_EXPORT_FILE: &str = "daemon-config.json";
pub const SESSION_MARKER_FILE: &str = "session-marker.json";
pub const USER_STOP_FILE: &str = "user-stop";
pub const LIFECYCLE_LOCK_FILE: &str = "lifecycle.lock";

pub fn lumen_root(home: &Path) -> PathBuf {
    home.join(".lumen")
}

pub fn settings_path(home: &Path) -> PathBuf {
    lumen_root(home).join(SETTINGS_FILE)
}

pub fn presets_path(home: &Path) -> PathBuf {
    lumen_root(home).join(PRESETS_FILE)
}

pub fn export_dir(home: &Path) -> PathBuf {
    lumen_root(home).join("export")
}

pub fn run_dir(home: &Path) -> PathBuf {
    lumen_root(home).join("run")
}

pub fn default_marker_path(home: &Path) -> PathBuf {
    run_dir(home).join(SESSION_MARKER_FILE)
}

pub fn user_stop_path(home: &Path) -> PathBuf {
    run_dir(home).join(USER_STOP_FILE)
}

pub fn lifecycle_lock_path(home: &Path) -> PathBuf {
    run_dir(home).join(LIFECYCLE_LOCK_FILE)
}

/// Where the streaming daemon keeps its config on this platform.
#[cfg(windows)]
pub fn default_daemon_config_path(_home: &Path) -> PathBuf {
    PathBuf::from(r"C:\Program Files\Sunshine\config\sunshine.conf")
}

#[cfg(not(windows))]
pub fn default_daemon_config_path(home: &Path) -> PathBuf {
    home.join(".config").join("sunshine").join("sunshine.conf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted_at_dot_lumen() {
        let home = Path::new("/home/tester");
        assert!(presets_path(home).ends_with(".lumen/presets.yaml"));
        assert!(default_marker_path(home).ends_with(".lumen/run/session-marker.json"));
        assert!(export_dir(home).ends_with(".lumen/export"));
    }
}
