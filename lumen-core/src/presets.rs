//! Preset library persisted at `~/.lumen/presets.yaml`.
//!
//! # API pattern
//!
//! Every function takes an explicit `home: &Path` (`*_at`), so tests run
//! against a `TempDir`; the no-arg wrappers derive home from `dirs::home_dir()`.
//!
//! The first load seeds a read-only `default` preset. Read-only presets can
//! never be overwritten or deleted.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::paths;
use crate::types::{Preset, PresetId};

pub const LIBRARY_VERSION: u32 = 1;
pub const DEFAULT_PRESET_ID: &str = "default";

/// On-disk library document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetLibrary {
    pub version: u32,
    #[serde(default)]
    pub presets: Vec<Preset>,
}

impl PresetLibrary {
    pub fn seeded() -> Self {
        let mut default = Preset::new(DEFAULT_PRESET_ID, "Default");
        default.is_read_only = true;
        Self {
            version: LIBRARY_VERSION,
            presets: vec![default],
        }
    }

    pub fn get(&self, id: &PresetId) -> Option<&Preset> {
        self.presets.iter().find(|p| &p.id == id)
    }
}

// ---------------------------------------------------------------------------
// 1. Load / save
// ---------------------------------------------------------------------------

/// Load the library, seeding (and persisting) the default preset on first use.
pub fn load_at(home: &Path) -> Result<PresetLibrary, CoreError> {
    let path = paths::presets_path(home);
    if !path.exists() {
        let library = PresetLibrary::seeded();
        save_at(home, &library)?;
        return Ok(library);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<PresetLibrary, CoreError> {
    load_at(&home()?)
}

/// Atomically save the library: serialize → `.yaml.tmp` → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, library: &PresetLibrary) -> Result<(), CoreError> {
    let root = paths::lumen_root(home);
    if !root.exists() {
        std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        set_dir_permissions(&root)?;
    }
    let path = paths::presets_path(home);
    let tmp = path.with_extension("yaml.tmp");

    let yaml = serde_yaml::to_string(library)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 2. Queries
// ---------------------------------------------------------------------------

pub fn get_at(home: &Path, id: &PresetId) -> Result<Preset, CoreError> {
    load_at(home)?
        .get(id)
        .cloned()
        .ok_or_else(|| CoreError::PresetNotFound { id: id.0.clone() })
}

// ---------------------------------------------------------------------------
// 3. Mutations
// ---------------------------------------------------------------------------

/// Insert a new preset, or replace an existing mutable one with the same id.
pub fn upsert_at(home: &Path, preset: Preset) -> Result<(), CoreError> {
    if let Some((key, reason)) = preset.invalid_expert_entry() {
        return Err(CoreError::InvalidExpertOverride {
            id: preset.id.0.clone(),
            key: key.to_string(),
            reason,
        });
    }
    let mut library = load_at(home)?;
    match library.presets.iter_mut().find(|p| p.id == preset.id) {
        Some(existing) if existing.is_read_only => {
            return Err(CoreError::ReadOnlyPreset {
                id: existing.id.0.clone(),
            })
        }
        Some(existing) => *existing = preset,
        None => library.presets.push(preset),
    }
    save_at(home, &library)
}

/// Insert a preset that must not already exist.
pub fn add_at(home: &Path, preset: Preset) -> Result<(), CoreError> {
    let library = load_at(home)?;
    if library.get(&preset.id).is_some() {
        return Err(CoreError::DuplicatePreset { id: preset.id.0 });
    }
    upsert_at(home, preset)
}

/// Remove a mutable preset.
pub fn delete_at(home: &Path, id: &PresetId) -> Result<Preset, CoreError> {
    let mut library = load_at(home)?;
    let idx = library
        .presets
        .iter()
        .position(|p| &p.id == id)
        .ok_or_else(|| CoreError::PresetNotFound { id: id.0.clone() })?;
    if library.presets[idx].is_read_only {
        return Err(CoreError::ReadOnlyPreset { id: id.0.clone() });
    }
    let removed = library.presets.remove(idx);
    save_at(home, &library)?;
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_load_seeds_read_only_default() {
        let home = TempDir::new().unwrap();
        let library = load_at(home.path()).expect("load");
        assert_eq!(library.presets.len(), 1);
        assert!(library.presets[0].is_read_only);
        assert!(paths::presets_path(home.path()).exists());
    }

    #[test]
    fn save_cleans_up_tmp() {
        let home = TempDir::new().unwrap();
        save_at(home.path(), &PresetLibrary::seeded()).unwrap();
        let tmp = paths::presets_path(home.path()).with_extension("yaml.tmp");
        assert!(!tmp.exists());
    }

    #[test]
    fn read_only_preset_cannot_be_replaced_or_deleted() {
        let home = TempDir::new().unwrap();
        let mut hijack = Preset::new(DEFAULT_PRESET_ID, "Hijacked");
        hijack.display.fps = 144;

        let err = upsert_at(home.path(), hijack).unwrap_err();
        assert!(matches!(err, CoreError::ReadOnlyPreset { .. }));
        let err = delete_at(home.path(), &PresetId::from(DEFAULT_PRESET_ID)).unwrap_err();
        assert!(matches!(err, CoreError::ReadOnlyPreset { .. }));

        let kept = get_at(home.path(), &PresetId::from(DEFAULT_PRESET_ID)).unwrap();
        assert_eq!(kept.name, "Default");
    }

    #[test]
    fn mutable_preset_lifecycle() {
        let home = TempDir::new().unwrap();
        let mut couch = Preset::new("couch", "Couch");
        add_at(home.path(), couch.clone()).expect("add");
        assert!(matches!(
            add_at(home.path(), couch.clone()),
            Err(CoreError::DuplicatePreset { .. })
        ));

        couch.display.fps = 120;
        upsert_at(home.path(), couch).expect("update");
        assert_eq!(get_at(home.path(), &"couch".into()).unwrap().display.fps, 120);

        delete_at(home.path(), &"couch".into()).expect("delete");
        assert!(matches!(
            get_at(home.path(), &"couch".into()),
            Err(CoreError::PresetNotFound { .. })
        ));
    }

    #[test]
    fn expert_override_with_line_break_is_rejected() {
        let home = TempDir::new().unwrap();
        let mut sneaky = Preset::new("sneaky", "Sneaky");
        sneaky.expert.insert(
            "capture".into(),
            crate::types::ExpertValue::Literal("kms\nport = 1".into()),
        );
        let err = add_at(home.path(), sneaky).unwrap_err();
        assert!(
            matches!(&err, CoreError::InvalidExpertOverride { key, .. } if key == "capture"),
            "{err}"
        );
        assert!(matches!(
            get_at(home.path(), &"sneaky".into()),
            Err(CoreError::PresetNotFound { .. })
        ));
    }
}
