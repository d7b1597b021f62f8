//! Error types for lumen-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from config store, preset library and settings operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, annotated with the path that was touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No addressable daemon config file at the configured location.
    #[error("daemon config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// The OS refused access to a file lumen needs to read or write.
    #[error("permission denied at {path}")]
    PermissionDenied { path: PathBuf },

    /// Persisting a single config key failed.
    #[error("failed to write key '{key}' to {path}: {source}")]
    WriteFailure {
        key: String,
        path: PathBuf,
        #[source]
        source: Box<CoreError>,
    },

    /// `restore_latest` was called but no backup exists next to the config file.
    #[error("no backup found for {path}")]
    NoBackupFound { path: PathBuf },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON parse error (orphan marker, snapshots).
    #[error("failed to parse JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("preset '{id}' is read-only")]
    ReadOnlyPreset { id: String },

    #[error("preset '{id}' not found")]
    PresetNotFound { id: String },

    #[error("preset '{id}' already exists")]
    DuplicatePreset { id: String },

    /// An expert override that cannot be written as one config line.
    #[error("preset '{id}' has an invalid expert override '{key}': {reason}")]
    InvalidExpertOverride {
        id: String,
        key: String,
        reason: &'static str,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.lumen/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`CoreError::Io`].
///
/// `PermissionDenied` I/O errors are surfaced as [`CoreError::PermissionDenied`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    let path = path.into();
    if source.kind() == std::io::ErrorKind::PermissionDenied {
        return CoreError::PermissionDenied { path };
    }
    CoreError::Io { path, source }
}
