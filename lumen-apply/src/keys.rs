//! Daemon config key vocabulary.
//!
//! Every key falls into exactly one [`KeyClass`]:
//!
//! | class       | owner                         | on flush                    |
//! |-------------|-------------------------------|-----------------------------|
//! | `Protected` | the user / pairing workflow   | never touched               |
//! | `Simple`    | the declarative preset model  | reset to the neutral value  |
//! | `Expert`    | everything else               | deleted unless re-specified |

use std::collections::BTreeMap;

use lumen_core::types::{Directive, EncoderProfile};

pub const OUTPUT_NAME: &str = "output_name";
pub const DD_CONFIGURATION_OPTION: &str = "dd_configuration_option";
pub const DD_RESOLUTION_OPTION: &str = "dd_resolution_option";
pub const DD_REFRESH_RATE_OPTION: &str = "dd_refresh_rate_option";
pub const DD_MANUAL_RESOLUTION: &str = "dd_manual_resolution";
pub const DD_MANUAL_REFRESH_RATE: &str = "dd_manual_refresh_rate";
/// Legacy fps key, still read by older daemon builds.
pub const FPS: &str = "fps";
pub const MINIMUM_FPS_TARGET: &str = "minimum_fps_target";
pub const MAX_BITRATE: &str = "max_bitrate";
pub const AUDIO_SINK: &str = "audio_sink";
pub const VIRTUAL_SINK: &str = "virtual_sink";
pub const UPNP: &str = "upnp";
pub const KEYBOARD: &str = "keyboard";
pub const MOUSE: &str = "mouse";
pub const GAMEPAD: &str = "gamepad";

pub const NVENC_PRESET: &str = "nvenc_preset";
pub const NVENC_TWOPASS: &str = "nvenc_twopass";
pub const NVENC_SPATIAL_AQ: &str = "nvenc_spatial_aq";
pub const QSV_PRESET: &str = "qsv_preset";
pub const AMD_QUALITY: &str = "amd_quality";
pub const SW_PRESET: &str = "sw_preset";

/// `dd_resolution_option` / `dd_refresh_rate_option`: use what the client asks for.
pub const CLIENT_REQUEST: &str = "moonlight_request";
pub const MANUAL: &str = "manual";
pub const ENABLED: &str = "enabled";
pub const DISABLED: &str = "disabled";
/// Sink value that turns a sink off.
pub const SINK_DISABLED: &str = "disabled";

pub const PROTECTED_KEYS: &[&str] = &[
    "sunshine_name",
    "credentials_file",
    "pkey",
    "cert",
    "file_state",
    "port",
    "system_tray",
];

pub const ENCODER_KEYS: &[&str] = &[
    NVENC_PRESET,
    NVENC_TWOPASS,
    NVENC_SPATIAL_AQ,
    QSV_PRESET,
    AMD_QUALITY,
    SW_PRESET,
];

pub const SIMPLE_KEYS: &[&str] = &[
    OUTPUT_NAME,
    DD_CONFIGURATION_OPTION,
    DD_RESOLUTION_OPTION,
    DD_REFRESH_RATE_OPTION,
    DD_MANUAL_RESOLUTION,
    DD_MANUAL_REFRESH_RATE,
    FPS,
    MINIMUM_FPS_TARGET,
    MAX_BITRATE,
    NVENC_PRESET,
    NVENC_TWOPASS,
    NVENC_SPATIAL_AQ,
    QSV_PRESET,
    AMD_QUALITY,
    SW_PRESET,
    AUDIO_SINK,
    VIRTUAL_SINK,
    UPNP,
    KEYBOARD,
    MOUSE,
    GAMEPAD,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    Protected,
    Simple,
    Expert,
}

pub fn classify(key: &str) -> KeyClass {
    if PROTECTED_KEYS.contains(&key) {
        KeyClass::Protected
    } else if SIMPLE_KEYS.contains(&key) {
        KeyClass::Simple
    } else {
        KeyClass::Expert
    }
}

pub fn is_protected(key: &str) -> bool {
    classify(key) == KeyClass::Protected
}

/// Encoder tuning keys for a profile, in [`ENCODER_KEYS`] order.
pub fn encoder_settings(profile: EncoderProfile) -> [(&'static str, &'static str); 6] {
    let values = match profile {
        EncoderProfile::Balanced => ["4", "quarter_res", DISABLED, "medium", "balanced", "superfast"],
        EncoderProfile::Quality => ["7", "full_res", ENABLED, "slow", "quality", "fast"],
        EncoderProfile::Performance => ["1", DISABLED, DISABLED, "veryfast", "speed", "ultrafast"],
    };
    [
        (NVENC_PRESET, values[0]),
        (NVENC_TWOPASS, values[1]),
        (NVENC_SPATIAL_AQ, values[2]),
        (QSV_PRESET, values[3]),
        (AMD_QUALITY, values[4]),
        (SW_PRESET, values[5]),
    ]
}

/// The flush baseline: one directive for every simple key.
pub fn neutral_config() -> BTreeMap<String, Directive> {
    let mut neutral = BTreeMap::new();
    let mut put = |key: &str, directive: Directive| {
        neutral.insert(key.to_string(), directive);
    };

    put(OUTPUT_NAME, Directive::Delete);
    put(DD_CONFIGURATION_OPTION, Directive::set(DISABLED));
    put(DD_RESOLUTION_OPTION, Directive::set(CLIENT_REQUEST));
    put(DD_REFRESH_RATE_OPTION, Directive::set(CLIENT_REQUEST));
    put(DD_MANUAL_RESOLUTION, Directive::Delete);
    put(DD_MANUAL_REFRESH_RATE, Directive::Delete);
    put(FPS, Directive::set("60"));
    put(MINIMUM_FPS_TARGET, Directive::set("60"));
    put(MAX_BITRATE, Directive::set("20"));
    for (key, value) in encoder_settings(EncoderProfile::Balanced) {
        put(key, Directive::set(value));
    }
    put(AUDIO_SINK, Directive::Delete);
    put(VIRTUAL_SINK, Directive::Delete);
    put(UPNP, Directive::set(DISABLED));
    put(KEYBOARD, Directive::set(ENABLED));
    put(MOUSE, Directive::set(ENABLED));
    put(GAMEPAD, Directive::set(ENABLED));
    neutral
}

/// The value the daemon assumes when `key` is absent from its config.
///
/// Taken from the neutral table; `None` means "no value" (and for expert
/// keys, "unknown").
pub fn daemon_default(key: &str) -> Option<&'static str> {
    Some(match key {
        DD_CONFIGURATION_OPTION | UPNP => DISABLED,
        DD_RESOLUTION_OPTION | DD_REFRESH_RATE_OPTION => CLIENT_REQUEST,
        FPS | MINIMUM_FPS_TARGET => "60",
        MAX_BITRATE => "20",
        KEYBOARD | MOUSE | GAMEPAD => ENABLED,
        _ => {
            return encoder_settings(EncoderProfile::Balanced)
                .into_iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v)
        }
    })
}

/// Preset field a simple key is derived from, for mismatch diagnostics.
pub fn field_label(key: &str) -> String {
    let label = match key {
        OUTPUT_NAME => "display.deviceId",
        DD_CONFIGURATION_OPTION => "display.assurance",
        DD_RESOLUTION_OPTION | DD_MANUAL_RESOLUTION => "display.resolution",
        DD_REFRESH_RATE_OPTION | DD_MANUAL_REFRESH_RATE => "display.refreshRate",
        FPS | MINIMUM_FPS_TARGET => "display.fps",
        MAX_BITRATE => "display.bitrate",
        AUDIO_SINK | VIRTUAL_SINK => "audio.mode",
        UPNP => "network.upnp",
        KEYBOARD => "inputs.keyboard",
        MOUSE => "inputs.mouse",
        GAMEPAD => "inputs.gamepad",
        k if ENCODER_KEYS.contains(&k) => "display.encoderProfile",
        other => return format!("expert.{other}"),
    };
    label.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_classes_are_disjoint() {
        for key in PROTECTED_KEYS {
            assert!(!SIMPLE_KEYS.contains(key), "{key} is both protected and simple");
        }
        assert_eq!(classify("port"), KeyClass::Protected);
        assert_eq!(classify("fps"), KeyClass::Simple);
        assert_eq!(classify("min_log_level"), KeyClass::Expert);
    }

    #[test]
    fn neutral_table_covers_every_simple_key() {
        let neutral = neutral_config();
        assert_eq!(neutral.len(), SIMPLE_KEYS.len());
        for key in SIMPLE_KEYS {
            assert!(neutral.contains_key(*key), "missing neutral value for {key}");
        }
    }

    #[test]
    fn daemon_defaults_agree_with_neutral_table() {
        for (key, directive) in neutral_config() {
            assert_eq!(daemon_default(&key), directive.value(), "{key}");
        }
        assert_eq!(daemon_default("min_log_level"), None);
    }

    #[test]
    fn encoder_profiles_differ_on_every_vendor() {
        let quality = encoder_settings(EncoderProfile::Quality);
        let speed = encoder_settings(EncoderProfile::Performance);
        assert_eq!(quality[0], (NVENC_PRESET, "7"));
        assert_eq!(speed[5], (SW_PRESET, "ultrafast"));
    }
}
