//! Snapshot files exported for the external session hooks.
//!
//! ```text
//! ~/.lumen/export/
//!   active-preset.json   {"activePresetId": "tv" | null, "updatedAt": ...}
//!   presets.json         {"presets": [...], "updatedAt": ...}
//!   daemon-config.json   {"configPath", "sha256", "values", "updatedAt"}
//! ```
//!
//! The hooks run outside this process, so each file is replaced atomically
//! (`.json.tmp` + rename) and never observed half-written.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use lumen_core::paths::{ACTIVE_EXPORT_FILE, CONFIG_EXPORT_FILE, PRESETS_EXPORT_FILE};
use lumen_core::types::{ConfigMap, Preset, PresetId};

use crate::error::{io_err, ApplyError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveExport {
    pub active_preset_id: Option<PresetId>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetsExport {
    pub presets: Vec<Preset>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigExport {
    pub config_path: PathBuf,
    /// SHA-256 of the config file text the values were parsed from.
    pub sha256: String,
    pub values: ConfigMap,
    pub updated_at: DateTime<Utc>,
}

pub fn active_path(export_dir: &Path) -> PathBuf {
    export_dir.join(ACTIVE_EXPORT_FILE)
}

pub fn presets_path(export_dir: &Path) -> PathBuf {
    export_dir.join(PRESETS_EXPORT_FILE)
}

pub fn config_path(export_dir: &Path) -> PathBuf {
    export_dir.join(CONFIG_EXPORT_FILE)
}

/// Hex SHA-256 digest, with CRLF normalised to LF first.
pub fn fingerprint(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

/// Last exported active preset id; `None` when never exported or cleared.
pub fn read_active(export_dir: &Path) -> Result<Option<PresetId>, ApplyError> {
    Ok(read_json::<ActiveExport>(&active_path(export_dir))?.and_then(|a| a.active_preset_id))
}

pub fn read_config(export_dir: &Path) -> Result<Option<ConfigExport>, ApplyError> {
    read_json(&config_path(export_dir))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ApplyError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path, e)),
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

pub fn write_active(export_dir: &Path, active: Option<&PresetId>) -> Result<(), ApplyError> {
    let doc = ActiveExport {
        active_preset_id: active.cloned(),
        updated_at: Utc::now(),
    };
    write_json(&active_path(export_dir), &doc)
}

pub fn write_presets(export_dir: &Path, presets: &[Preset]) -> Result<(), ApplyError> {
    let doc = PresetsExport {
        presets: presets.to_vec(),
        updated_at: Utc::now(),
    };
    write_json(&presets_path(export_dir), &doc)
}

pub fn write_config(
    export_dir: &Path,
    source: &Path,
    text: &str,
    values: &ConfigMap,
) -> Result<(), ApplyError> {
    let doc = ConfigExport {
        config_path: source.to_path_buf(),
        sha256: fingerprint(text),
        values: values.clone(),
        updated_at: Utc::now(),
    };
    write_json(&config_path(export_dir), &doc)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ApplyError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
