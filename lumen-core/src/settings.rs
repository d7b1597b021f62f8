//! User settings loaded from `~/.lumen/settings.yaml`.
//!
//! Every field has a default; a missing file yields [`Settings::defaults_for`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::paths;

/// Number of config backups kept next to the daemon config.
pub const DEFAULT_BACKUP_RETENTION: usize = 5;

/// A program plus its arguments, e.g. `["systemctl", "--user", "start", "sunshine"]`.
pub type CommandLine = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// The daemon's key/value config file.
    pub config_path: PathBuf,
    /// Process name used to detect and terminate the daemon.
    pub process_name: String,
    pub start_command: CommandLine,
    /// When absent, the process is terminated by name.
    pub stop_command: Option<CommandLine>,
    /// Graceful-shutdown hook, run before a stop while a session marker exists.
    pub session_end_hook: Option<CommandLine>,
    /// Display helper used by crash recovery; see `lumen_supervisor::recovery`.
    pub display_tool: Option<CommandLine>,
    /// Optional HTTP endpoint used to tell ONLINE from AUTH_REQUIRED.
    pub status_probe_url: Option<String>,
    pub marker_path: PathBuf,
    pub backup_retention: usize,
    pub timings: Timings,
}

impl Settings {
    pub fn defaults_for(home: &Path) -> Self {
        Self {
            config_path: paths::default_daemon_config_path(home),
            process_name: "sunshine".to_string(),
            start_command: vec!["sunshine".to_string()],
            stop_command: None,
            session_end_hook: None,
            display_tool: None,
            status_probe_url: None,
            marker_path: paths::default_marker_path(home),
            backup_retention: DEFAULT_BACKUP_RETENTION,
            timings: Timings::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::defaults_for(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }
}

/// Polling intervals and deadlines, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub status_poll_ms: u64,
    pub recovery_delay_ms: u64,
    pub watchdog_delay_ms: u64,
    pub lifecycle_poll_ms: u64,
    pub lifecycle_deadline_ms: u64,
    pub restart_settle_ms: u64,
    pub lock_wait_ms: u64,
    pub config_debounce_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            status_poll_ms: 3_000,
            recovery_delay_ms: 7_000,
            watchdog_delay_ms: 4_000,
            lifecycle_poll_ms: 300,
            lifecycle_deadline_ms: 5_000,
            restart_settle_ms: 2_000,
            lock_wait_ms: 15_000,
            config_debounce_ms: 500,
        }
    }
}

impl Timings {
    pub fn status_poll(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms)
    }
    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }
    pub fn watchdog_delay(&self) -> Duration {
        Duration::from_millis(self.watchdog_delay_ms)
    }
    pub fn lifecycle_poll(&self) -> Duration {
        Duration::from_millis(self.lifecycle_poll_ms)
    }
    pub fn lifecycle_deadline(&self) -> Duration {
        Duration::from_millis(self.lifecycle_deadline_ms)
    }
    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
    pub fn config_debounce(&self) -> Duration {
        Duration::from_millis(self.config_debounce_ms)
    }
}

/// Load `<home>/.lumen/settings.yaml`, falling back to defaults when absent.
///
/// Fields missing from the file keep their defaults; relative to `home`
/// where a default path is involved.
pub fn load_at(home: &Path) -> Result<Settings, CoreError> {
    let path = paths::settings_path(home);
    if !path.exists() {
        return Ok(Settings::defaults_for(home));
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let value: serde_yaml::Value =
        serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse {
            path: path.clone(),
            source: e,
        })?;

    // Merge over home-relative defaults instead of `Default::default()`,
    // which would resolve against the real home directory.
    let mut merged = serde_yaml::to_value(Settings::defaults_for(home))?;
    if let (serde_yaml::Value::Mapping(base), serde_yaml::Value::Mapping(overrides)) =
        (&mut merged, value)
    {
        for (key, value) in overrides {
            base.insert(key, value);
        }
    }
    serde_yaml::from_value(merged).map_err(|e| CoreError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, CoreError> {
    load_at(&dirs::home_dir().ok_or(CoreError::HomeNotFound)?)
}
