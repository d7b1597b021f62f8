//! Active-preset reconciliation.
//!
//! Which preset is "active" is inferred from the live config, never stored
//! as truth. [`resync`] re-derives it and re-exports the snapshot files the
//! session hooks read.

use lumen_core::types::{Preset, PresetId};
use lumen_core::{Context, CoreError};

use crate::error::ApplyError;
use crate::matcher::find_all_matching;
use crate::snapshot;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncOutcome {
    pub previous: Option<PresetId>,
    pub active: Option<PresetId>,
    pub matches: Vec<PresetId>,
    /// `false` when the daemon config file does not exist.
    pub config_found: bool,
}

impl ResyncOutcome {
    pub fn changed(&self) -> bool {
        self.previous != self.active
    }
}

/// Pick the active preset from the matching ids.
///
/// None → cleared; one → adopted; several → the previous id if it is still
/// among them, otherwise the first.
pub fn choose_active(previous: Option<&PresetId>, matches: &[PresetId]) -> Option<PresetId> {
    match matches {
        [] => None,
        [only] => Some(only.clone()),
        [first, ..] => previous
            .filter(|prev| matches.contains(*prev))
            .cloned()
            .or_else(|| Some(first.clone())),
    }
}

/// Re-derive the active preset from the live config and re-export snapshots.
///
/// A missing daemon config clears the active id and skips the config export;
/// the preset and active-id exports are still written.
pub fn resync(ctx: &Context, presets: &[Preset]) -> Result<ResyncOutcome, ApplyError> {
    let export_dir = ctx.export_dir();
    let previous = match snapshot::read_active(&export_dir) {
        Ok(previous) => previous,
        Err(err) => {
            // Rewritten below.
            tracing::warn!("ignoring unreadable active-preset export: {err}");
            None
        }
    };

    let (config_found, matches) = match ctx.store.load() {
        Ok(doc) => {
            let observed = doc.entries();
            snapshot::write_config(&export_dir, ctx.store.path(), &doc.render(), &observed)?;
            (true, find_all_matching(&observed, presets))
        }
        Err(CoreError::ConfigNotFound { path }) => {
            tracing::warn!("daemon config not found at {}; clearing active preset", path.display());
            (false, Vec::new())
        }
        Err(err) => return Err(err.into()),
    };

    let active = choose_active(previous.as_ref(), &matches);
    snapshot::write_active(&export_dir, active.as_ref())?;
    snapshot::write_presets(&export_dir, presets)?;

    let outcome = ResyncOutcome {
        previous,
        active,
        matches,
        config_found,
    };
    if outcome.changed() {
        tracing::info!(
            "active preset: {} -> {}",
            display_id(outcome.previous.as_ref()),
            display_id(outcome.active.as_ref())
        );
    }
    Ok(outcome)
}

fn display_id(id: Option<&PresetId>) -> &str {
    id.map(|id| id.0.as_str()).unwrap_or("none")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<PresetId> {
        raw.iter().map(|s| PresetId::from(*s)).collect()
    }

    #[test]
    fn no_match_clears() {
        assert_eq!(choose_active(Some(&"a".into()), &[]), None);
    }

    #[test]
    fn single_match_is_adopted() {
        assert_eq!(choose_active(Some(&"a".into()), &ids(&["b"])), Some("b".into()));
    }

    #[test]
    fn many_matches_prefer_previous() {
        assert_eq!(choose_active(Some(&"c".into()), &ids(&["b", "c"])), Some("c".into()));
    }

    #[test]
    fn many_matches_without_previous_take_first() {
        assert_eq!(choose_active(Some(&"z".into()), &ids(&["b", "c"])), Some("b".into()));
        assert_eq!(choose_active(None, &ids(&["b", "c"])), Some("b".into()));
    }
}
