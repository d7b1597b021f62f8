//! The "user-initiated stop" flag.
//!
//! Kept as a file under `~/.lumen/run/` so a `lumen daemon stop` in one
//! process is visible to the watchdog running in `lumen watch`.

use std::path::{Path, PathBuf};

use lumen_core::paths;

use crate::error::{io_err, SupervisorError};

#[derive(Debug, Clone)]
pub struct UserStopFlag {
    path: PathBuf,
}

impl UserStopFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at(home: &Path) -> Self {
        Self::new(paths::user_stop_path(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set(&self) -> Result<(), SupervisorError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        std::fs::write(&self.path, b"").map_err(|e| io_err(&self.path, e))
    }

    pub fn is_set(&self) -> bool {
        self.path.exists()
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        match std::fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to clear user-stop flag");
                true
            }
        }
    }
}
