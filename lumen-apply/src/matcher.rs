//! Config matcher: does the daemon's observed config equal what a preset
//! would produce?
//!
//! Matching is strict. Every key the compiler derives for the preset is
//! compared against the observed value, with absent keys read as the daemon's
//! own default ([`keys::daemon_default`]); one mismatch disqualifies the preset.
//! Keys the preset does not derive (unrelated expert keys) are ignored.

use lumen_core::types::{ConfigMap, Preset, PresetId};

use crate::compiler::compile;
use crate::keys;

/// One derived key whose observed value differs from the expected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMismatch {
    pub key: String,
    /// Preset field the key derives from, e.g. `display.fps` or `expert.min_log_level`.
    pub field: String,
    /// `None` = the key should be absent.
    pub expected: Option<String>,
    /// Observed value after daemon defaulting; `None` = absent.
    pub actual: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub preset_id: PresetId,
    pub matches: bool,
    pub mismatches: Vec<FieldMismatch>,
}

/// Compare `observed` against `preset`, field by field.
pub fn match_preset(observed: &ConfigMap, preset: &Preset) -> MatchReport {
    let mut mismatches = Vec::new();
    for (key, directive) in compile(preset, Some(observed)) {
        let expected = directive.value();
        let overridden = preset.expert.contains_key(&key);
        let actual = effective_value(observed, &key, overridden);
        if expected != actual {
            let field = if overridden {
                format!("expert.{key}")
            } else {
                keys::field_label(&key)
            };
            mismatches.push(FieldMismatch {
                field,
                expected: expected.map(str::to_string),
                actual: actual.map(str::to_string),
                key,
            });
        }
    }
    MatchReport {
        preset_id: preset.id.clone(),
        matches: mismatches.is_empty(),
        mismatches,
    }
}

/// Ids of every preset matching `observed`, in input order.
pub fn find_all_matching(observed: &ConfigMap, presets: &[Preset]) -> Vec<PresetId> {
    presets
        .iter()
        .filter(|p| match_preset(observed, p).matches)
        .map(|p| p.id.clone())
        .collect()
}

/// Observed value for `key`, with an absent value read as the daemon default.
///
/// A blank value also reads as the default, except for keys the preset sets
/// through an expert override: there `key = ` is the literal empty string.
fn effective_value<'a>(observed: &'a ConfigMap, key: &str, overridden: bool) -> Option<&'a str> {
    match observed.get(key).map(String::as_str) {
        Some(v) if !v.is_empty() || overridden => Some(v),
        _ => keys::daemon_default(key),
    }
}
