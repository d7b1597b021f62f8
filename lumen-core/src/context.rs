//! Explicit per-process context: home directory, settings and the config store.
//!
//! Constructed once by the entrypoint and passed down, so independent
//! instances (tests, tools) never share state.

use std::path::{Path, PathBuf};

use crate::config_file::ConfigStore;
use crate::error::CoreError;
use crate::settings::{self, Settings};
use crate::{paths, presets};

#[derive(Debug, Clone)]
pub struct Context {
    pub home: PathBuf,
    pub settings: Settings,
    pub store: ConfigStore,
}

impl Context {
    pub fn new(home: impl Into<PathBuf>, settings: Settings) -> Self {
        let store = ConfigStore::new(settings.config_path.clone(), settings.backup_retention);
        Self {
            home: home.into(),
            settings,
            store,
        }
    }

    /// Build a context from `<home>/.lumen/settings.yaml`.
    pub fn load_at(home: &Path) -> Result<Self, CoreError> {
        Ok(Self::new(home, settings::load_at(home)?))
    }

    pub fn presets(&self) -> Result<presets::PresetLibrary, CoreError> {
        presets::load_at(&self.home)
    }

    pub fn export_dir(&self) -> PathBuf {
        paths::export_dir(&self.home)
    }

    pub fn marker_path(&self) -> &Path {
        &self.settings.marker_path
    }
}
