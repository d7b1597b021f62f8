//! Roundtrip serialisation tests for `lumen-core` preset types.
//!
//! Presets are stored as YAML and exported as JSON; both must roundtrip.
//! Each `#[case]` is isolated; no shared state.

use std::collections::BTreeMap;

use lumen_core::types::{
    AssuranceMode, AudioMode, EncoderProfile, ExpertValue, Preset, Resolution,
    ResolutionStrategy,
};
use rstest::rstest;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn minimal_preset() -> Preset {
    Preset::new("minimal", "Minimal")
}

fn full_preset() -> Preset {
    let mut preset = Preset::new("living-room", "Living room TV");
    preset.display.assurance = AssuranceMode::Focus;
    preset.display.device_id = Some("{8a1b-42}".to_string());
    preset.display.strategy = ResolutionStrategy::Manual;
    preset.display.fps = 120;
    preset.display.bitrate = 80;
    preset.display.encoder_profile = Some(EncoderProfile::Quality);
    preset.display.manual_resolution = Some(Resolution { width: 3840, height: 2160 });
    preset.display.manual_refresh_rate = Some("119.88".to_string());
    preset.audio.mode = AudioMode::Both;
    preset.audio.host_device_id = Some("{0.0.0.00000000}.{speakers}".to_string());
    preset.network.upnp = true;
    preset.inputs.gamepad = false;
    preset.expert = BTreeMap::from([
        ("min_log_level".to_string(), ExpertValue::Literal("debug".to_string())),
        ("adapter_name".to_string(), ExpertValue::Keep),
    ]);
    preset
}

fn unicode_preset() -> Preset {
    let mut preset = Preset::new("séjour-🎮", "Salle de séjour 日本語");
    preset.audio.mode = AudioMode::HostOnly;
    preset
}

fn read_only_preset() -> Preset {
    let mut preset = Preset::new("default", "Default");
    preset.is_read_only = true;
    preset
}

// ---------------------------------------------------------------------------
// Parameterised roundtrip test
// ---------------------------------------------------------------------------

#[rstest]
#[case("minimal", minimal_preset())]
#[case("all_fields", full_preset())]
#[case("unicode_strings", unicode_preset())]
#[case("read_only", read_only_preset())]
fn preset_yaml_and_json_roundtrip(#[case] label: &str, #[case] preset: Preset) {
    let yaml = serde_yaml::to_string(&preset)
        .unwrap_or_else(|e| panic!("[{label}] yaml serialize failed: {e}"));
    let back: Preset = serde_yaml::from_str(&yaml)
        .unwrap_or_else(|e| panic!("[{label}] yaml deserialize failed: {e}"));
    assert_eq!(preset, back, "[{label}] yaml");

    let json = serde_json::to_string(&preset)
        .unwrap_or_else(|e| panic!("[{label}] json serialize failed: {e}"));
    let back: Preset = serde_json::from_str(&json)
        .unwrap_or_else(|e| panic!("[{label}] json deserialize failed: {e}"));
    assert_eq!(preset, back, "[{label}] json");
}

#[test]
fn exported_json_uses_camel_case_field_names() {
    let json = serde_json::to_value(full_preset()).expect("serialize");
    assert_eq!(json["isReadOnly"], serde_json::json!(false));
    assert_eq!(json["display"]["deviceId"], serde_json::json!("{8a1b-42}"));
    assert_eq!(json["display"]["assurance"], serde_json::json!("focus"));
    assert_eq!(json["display"]["manualResolution"]["width"], serde_json::json!(3840));
    assert_eq!(json["audio"]["mode"], serde_json::json!("both"));
    assert_eq!(json["expert"]["adapter_name"], serde_json::json!("KEEP"));
}

// ---------------------------------------------------------------------------
// Enum roundtrips
// ---------------------------------------------------------------------------

#[rstest]
#[case(AssuranceMode::Standard, "standard")]
#[case(AssuranceMode::Check, "check")]
#[case(AssuranceMode::Enable, "enable")]
#[case(AssuranceMode::EnablePrimary, "enable-primary")]
#[case(AssuranceMode::Focus, "focus")]
fn assurance_mode_wire_names(#[case] mode: AssuranceMode, #[case] wire: &str) {
    let yaml = serde_yaml::to_string(&mode).expect("serialize");
    assert_eq!(yaml.trim(), wire);
    assert_eq!(AssuranceMode::parse(wire), Some(mode));
    assert_eq!(AssuranceMode::parse(mode.daemon_value()), Some(mode));
}

#[rstest]
#[case(ResolutionStrategy::FollowClient, "follow-client")]
#[case(ResolutionStrategy::FollowPreset, "follow-preset")]
#[case(ResolutionStrategy::Manual, "manual")]
fn strategy_wire_names(#[case] strategy: ResolutionStrategy, #[case] wire: &str) {
    let back: ResolutionStrategy =
        serde_yaml::from_str(wire).expect("deserialize");
    assert_eq!(back, strategy);
}
