//! Preset compiler: a preset becomes a set of per-key [`Directive`]s.
//!
//! Pure and deterministic. The output always covers every simple key; expert
//! overrides are layered on last and may add further keys. Protected keys are
//! never emitted, even when an expert override names one.

use std::collections::BTreeMap;

use lumen_core::types::{
    expert_entry_problem, AudioMode, ConfigMap, Directive, ExpertValue, Preset,
    ResolutionStrategy,
};

use crate::keys::{self, KeyClass};

/// Key → directive, ordered by key.
pub type CompiledConfig = BTreeMap<String, Directive>;

/// The flush baseline; see [`keys::neutral_config`].
pub fn generate_neutral_config() -> CompiledConfig {
    keys::neutral_config()
}

/// Compile `preset` into directives.
///
/// `observed` is only consulted for `KEEP` expert values: the observed value
/// is copied verbatim, and a key absent from `observed` (or no `observed` at
/// all) is left out of the result.
pub fn compile(preset: &Preset, observed: Option<&ConfigMap>) -> CompiledConfig {
    let mut out = CompiledConfig::new();
    let mut put = |key: &str, directive: Directive| {
        out.insert(key.to_string(), directive);
    };
    let display = &preset.display;

    put(
        keys::OUTPUT_NAME,
        match &display.device_id {
            Some(id) if !id.is_empty() => Directive::set(id),
            _ => Directive::Delete,
        },
    );
    put(
        keys::DD_CONFIGURATION_OPTION,
        Directive::set(display.assurance.daemon_value()),
    );

    // Resolution and refresh rate are decided independently: follow-preset
    // with only one concrete value pins that axis and follows the client on
    // the other.
    let pinned = display.strategy != ResolutionStrategy::FollowClient;
    match display.manual_resolution.filter(|_| pinned) {
        Some(resolution) => {
            put(keys::DD_RESOLUTION_OPTION, Directive::set(keys::MANUAL));
            put(keys::DD_MANUAL_RESOLUTION, Directive::set(resolution.to_string()));
        }
        None => {
            put(keys::DD_RESOLUTION_OPTION, Directive::set(keys::CLIENT_REQUEST));
            put(keys::DD_MANUAL_RESOLUTION, Directive::Delete);
        }
    }
    match display.manual_refresh_rate.as_deref().filter(|r| pinned && !r.is_empty()) {
        Some(rate) => {
            put(keys::DD_REFRESH_RATE_OPTION, Directive::set(keys::MANUAL));
            put(keys::DD_MANUAL_REFRESH_RATE, Directive::set(rate));
        }
        None => {
            put(keys::DD_REFRESH_RATE_OPTION, Directive::set(keys::CLIENT_REQUEST));
            put(keys::DD_MANUAL_REFRESH_RATE, Directive::Delete);
        }
    }

    let fps = display.fps.to_string();
    put(keys::FPS, Directive::set(&fps));
    put(keys::MINIMUM_FPS_TARGET, Directive::set(fps));
    put(keys::MAX_BITRATE, Directive::set(display.bitrate.to_string()));

    for (key, value) in keys::encoder_settings(display.encoder_profile.unwrap_or_default()) {
        put(key, Directive::set(value));
    }

    let (audio_sink, virtual_sink) = match preset.audio.mode {
        AudioMode::ClientOnly => (Directive::Delete, Directive::Delete),
        AudioMode::HostOnly => (
            Directive::set(keys::SINK_DISABLED),
            Directive::set(keys::SINK_DISABLED),
        ),
        AudioMode::Both => (
            match &preset.audio.host_device_id {
                Some(id) if !id.is_empty() => Directive::set(id),
                _ => Directive::Delete,
            },
            Directive::set(keys::SINK_DISABLED),
        ),
    };
    put(keys::AUDIO_SINK, audio_sink);
    put(keys::VIRTUAL_SINK, virtual_sink);

    put(keys::UPNP, Directive::set(toggle(preset.network.upnp)));
    put(keys::KEYBOARD, Directive::set(toggle(preset.inputs.keyboard)));
    put(keys::MOUSE, Directive::set(toggle(preset.inputs.mouse)));
    put(keys::GAMEPAD, Directive::set(toggle(preset.inputs.gamepad)));

    for (key, value) in &preset.expert {
        if keys::classify(key) == KeyClass::Protected {
            tracing::warn!("preset {}: ignoring expert override of protected key {key}", preset.id);
            continue;
        }
        if let Some(reason) = expert_entry_problem(key, value) {
            tracing::warn!("preset {}: ignoring expert override {key:?}: {reason}", preset.id);
            continue;
        }
        match value {
            ExpertValue::Literal(v) => {
                out.insert(key.clone(), Directive::set(v));
            }
            ExpertValue::Keep => match observed.and_then(|o| o.get(key)) {
                Some(current) => {
                    out.insert(key.clone(), Directive::set(current));
                }
                None => {
                    out.remove(key);
                }
            },
        }
    }

    out
}

fn toggle(on: bool) -> &'static str {
    if on {
        keys::ENABLED
    } else {
        keys::DISABLED
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
