use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use lumen_apply::ApplyError;
use lumen_core::CoreError;

/// Error surface for process lifecycle, recovery and the watch runtime.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Start/stop did not reach the expected process state before the deadline.
    #[error("daemon did not {action} within {waited:?}")]
    ProcessTimeout {
        action: &'static str,
        waited: Duration,
    },

    /// Another lifecycle operation held the lock for the whole wait.
    #[error("another start/stop/restart is in progress (waited {waited:?})")]
    Busy { waited: Duration },

    /// An external command could not be run or exited unsuccessfully.
    #[error("command `{program}` failed: {detail}")]
    Command { program: String, detail: String },

    /// The config was written but the follow-up restart failed.
    #[error("preset '{preset}' was written but the daemon restart failed (rolled back: {rolled_back}): {source}")]
    PartialApply {
        preset: String,
        rolled_back: bool,
        #[source]
        source: Box<SupervisorError>,
    },

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("{task} task join failure: {detail}")]
    Join { task: String, detail: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SupervisorError {
    SupervisorError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn join_err(task: &str, err: tokio::task::JoinError) -> SupervisorError {
    SupervisorError::Join {
        task: task.to_string(),
        detail: err.to_string(),
    }
}
