//! lumen core library: domain types, the daemon config store, the preset
//! library, settings and errors.
//!
//! - [`types`]: presets, config directives, process status, orphan marker
//! - [`config_file`]: format-preserving `key = value` store with backups
//! - [`presets`]: preset library load / save / upsert / delete
//! - [`settings`]: `~/.lumen/settings.yaml`
//! - [`context`]: explicit context handed to every component

pub mod config_file;
pub mod context;
pub mod error;
pub mod paths;
pub mod presets;
pub mod settings;
pub mod types;

pub use config_file::{ConfigDocument, ConfigStore};
pub use context::Context;
pub use error::CoreError;
pub use settings::{Settings, Timings};
pub use types::{
    AssuranceMode, AudioConfig, AudioMode, ConfigMap, Directive, DisplayConfig, EncoderProfile,
    ExpertValue, InputConfig, NetworkConfig, OrphanMarker, Preset, PresetId, ProcessStatus,
    Resolution, ResolutionStrategy,
};
