//! Error types for lumen-apply.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use lumen_core::CoreError;

/// Apply pipeline phase, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Backup,
    Detect,
    Flush,
    Apply,
    Write,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Backup => "backup",
            Phase::Detect => "detect",
            Phase::Flush => "flush",
            Phase::Apply => "apply",
            Phase::Write => "write",
        };
        f.write_str(s)
    }
}

/// All errors that can arise from apply, diff and reconciliation.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// A pipeline phase failed; later phases did not run.
    #[error("apply aborted in {phase} phase: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: CoreError,
    },

    /// Config store or preset library error outside the pipeline.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot export JSON error.
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApplyError {
    /// The pipeline phase that failed, if this is a pipeline abort.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            ApplyError::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Convenience constructor for [`ApplyError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ApplyError {
    ApplyError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn phase_err(phase: Phase) -> impl FnOnce(CoreError) -> ApplyError {
    move |source| ApplyError::Phase { phase, source }
}
