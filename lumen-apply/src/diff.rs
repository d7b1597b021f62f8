//! Dry-run unified diff support for `lumen diff`.

use std::path::PathBuf;

use similar::TextDiff;

use lumen_core::types::{Directive, Preset};
use lumen_core::ConfigStore;

use crate::error::{phase_err, ApplyError, Phase};
use crate::pipeline::plan;

/// The daemon config as it is now versus after applying a preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDiff {
    pub path: PathBuf,
    /// Empty when applying the preset would change nothing.
    pub unified_diff: String,
}

impl ConfigDiff {
    pub fn is_empty(&self) -> bool {
        self.unified_diff.is_empty()
    }
}

/// Render what `apply` would write and compare it to the live file.
///
/// No files are written.
pub fn diff(store: &ConfigStore, preset: &Preset) -> Result<ConfigDiff, ApplyError> {
    let before = store.load().map_err(phase_err(Phase::Detect))?;
    let current = before.entries();

    let mut after = before.clone();
    for (key, directive) in plan(preset, &current, &current) {
        match directive {
            Directive::Set(value) => {
                after.set(&key, &value);
            }
            Directive::Delete => {
                after.remove(&key);
            }
        }
    }

    let old = normalize_line_endings(&before.render());
    let new = normalize_line_endings(&after.render());
    let unified_diff = if old == new {
        String::new()
    } else {
        let name = store
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());
        TextDiff::from_lines(&old, &new)
            .unified_diff()
            .header(&format!("a/{name}"), &format!("b/{name}"))
            .context_radius(3)
            .to_string()
    };

    Ok(ConfigDiff {
        path: store.path().to_path_buf(),
        unified_diff,
    })
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
