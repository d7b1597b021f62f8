//! Apply pipeline: move the daemon config from its current state to a preset.
//!
//! ## Phases
//!
//! 1. Backup: copy the live file aside. Best-effort; failure is logged.
//! 2. Detect: read the current config (needed for `KEEP` and for the flush).
//! 3. Flush: every simple key back to neutral, every expert key the preset
//!    does not re-specify deleted. Protected keys are never touched.
//! 4. Apply: compile the preset and overlay it on the flushed baseline.
//! 5. Write: persist the plan one key at a time through [`ConfigStore`].
//!    Keys already holding their target value are skipped; the first failure
//!    aborts with [`Phase::Write`].
//!
//! Restarting the daemon is not part of this pipeline.

use std::path::PathBuf;

use lumen_core::types::{ConfigMap, Directive, Preset, PresetId};
use lumen_core::ConfigStore;

use crate::compiler::{compile, generate_neutral_config, CompiledConfig};
use crate::error::{phase_err, ApplyError, Phase};
use crate::keys::{self, KeyClass};

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of a single key in the write phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Written { key: String, value: String },
    Deleted { key: String },
    /// The key already held its target value (or was already absent).
    Unchanged { key: String },
    /// `dry_run` mode: the key *would* have been written.
    WouldWrite { key: String, value: String },
    /// `dry_run` mode: the key *would* have been deleted.
    WouldDelete { key: String },
}

impl WriteResult {
    pub fn key(&self) -> &str {
        match self {
            WriteResult::Written { key, .. }
            | WriteResult::Deleted { key }
            | WriteResult::Unchanged { key }
            | WriteResult::WouldWrite { key, .. }
            | WriteResult::WouldDelete { key } => key,
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, WriteResult::Unchanged { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Report what would change; no backup, nothing written.
    pub dry_run: bool,
    /// Resolve `KEEP` against this map instead of the detected config.
    pub observed: Option<ConfigMap>,
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub preset_id: PresetId,
    pub backup: Option<PathBuf>,
    pub writes: Vec<WriteResult>,
}

impl ApplyReport {
    pub fn changed(&self) -> usize {
        self.writes.iter().filter(|w| w.is_change()).count()
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Flush + apply: the directive for every key the pipeline will touch.
///
/// `current` is the config as it is now; `keep_source` resolves `KEEP`.
pub fn plan(preset: &Preset, current: &ConfigMap, keep_source: &ConfigMap) -> CompiledConfig {
    let mut target = generate_neutral_config();
    for key in current.keys() {
        if keys::classify(key) == KeyClass::Expert && !preset.expert.contains_key(key) {
            target.insert(key.clone(), Directive::Delete);
        }
    }
    target.extend(compile(preset, Some(keep_source)));
    target.retain(|key, _| !keys::is_protected(key));
    target
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// Run the pipeline for `preset` against `store`.
pub fn apply(
    store: &ConfigStore,
    preset: &Preset,
    options: &ApplyOptions,
) -> Result<ApplyReport, ApplyError> {
    // Phase 1: backup.
    let backup = if options.dry_run {
        None
    } else {
        match store.backup() {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!("backup before applying {} failed: {err}", preset.id);
                None
            }
        }
    };

    // Phase 2: detect.
    let doc = store.load().map_err(phase_err(Phase::Detect))?;
    let current = doc.entries();
    let keep_source = options.observed.as_ref().unwrap_or(&current);

    // Phases 3 + 4: flush and overlay.
    let target = plan(preset, &current, keep_source);

    // Phase 5: write.
    let mut writes = Vec::with_capacity(target.len());
    for (key, directive) in target {
        let existing = doc.get(&key);
        let result = match directive {
            Directive::Set(value) if existing.as_deref() == Some(value.as_str()) => {
                WriteResult::Unchanged { key }
            }
            Directive::Delete if existing.is_none() => WriteResult::Unchanged { key },
            Directive::Set(value) if options.dry_run => WriteResult::WouldWrite { key, value },
            Directive::Delete if options.dry_run => WriteResult::WouldDelete { key },
            Directive::Set(value) => {
                store.write(&key, &value).map_err(phase_err(Phase::Write))?;
                WriteResult::Written { key, value }
            }
            Directive::Delete => {
                store.delete(&key).map_err(phase_err(Phase::Write))?;
                WriteResult::Deleted { key }
            }
        };
        writes.push(result);
    }

    let report = ApplyReport {
        preset_id: preset.id.clone(),
        backup,
        writes,
    };
    if options.dry_run {
        tracing::info!("[dry-run] {} key(s) would change for {}", report.changed(), preset.id);
    } else {
        tracing::info!("applied {}: {} key(s) changed", preset.id, report.changed());
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
