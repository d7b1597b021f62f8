//! Domain types for presets, daemon config values, process status and the
//! orphan marker written by the external session hooks.
//!
//! Presets serialize with camelCase field names: the same documents are
//! stored in `presets.yaml` and exported as JSON for the session hooks.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Parsed view of the daemon config file: addressable `key = value` lines only.
pub type ConfigMap = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable, unique preset identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PresetId(pub String);

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PresetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PresetId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Config values
// ---------------------------------------------------------------------------

/// What the compiler wants a single config key to become.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Write `key = value`.
    Set(String),
    /// Remove the key from the config file entirely.
    Delete,
}

impl Directive {
    pub fn set(value: impl Into<String>) -> Self {
        Directive::Set(value.into())
    }

    /// The value the key holds once this directive is applied (`None` = absent).
    pub fn value(&self) -> Option<&str> {
        match self {
            Directive::Set(value) => Some(value),
            Directive::Delete => None,
        }
    }
}

/// A raw expert override: a literal value, or "keep whatever the daemon has".
///
/// Stored on disk as a plain string; the literal `KEEP` is the keep marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExpertValue {
    Literal(String),
    Keep,
}

pub const KEEP_MARKER: &str = "KEEP";

impl From<String> for ExpertValue {
    fn from(s: String) -> Self {
        if s == KEEP_MARKER {
            ExpertValue::Keep
        } else {
            ExpertValue::Literal(s)
        }
    }
}

impl From<ExpertValue> for String {
    fn from(v: ExpertValue) -> Self {
        match v {
            ExpertValue::Literal(s) => s,
            ExpertValue::Keep => KEEP_MARKER.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How aggressively the daemon asserts the target display's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AssuranceMode {
    #[default]
    Standard,
    Check,
    Enable,
    EnablePrimary,
    Focus,
}

impl AssuranceMode {
    /// Value of `dd_configuration_option` for this mode.
    pub fn daemon_value(self) -> &'static str {
        match self {
            AssuranceMode::Standard => "disabled",
            AssuranceMode::Check => "verify_only",
            AssuranceMode::Enable => "ensure_active",
            AssuranceMode::EnablePrimary => "ensure_primary",
            AssuranceMode::Focus => "ensure_only",
        }
    }

    /// Modes under which the daemon may move the primary display.
    pub fn changes_primary(self) -> bool {
        matches!(self, AssuranceMode::EnablePrimary | AssuranceMode::Focus)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" | "disabled" => Some(AssuranceMode::Standard),
            "check" | "verify_only" => Some(AssuranceMode::Check),
            "enable" | "ensure_active" => Some(AssuranceMode::Enable),
            "enable-primary" | "ensure_primary" => Some(AssuranceMode::EnablePrimary),
            "focus" | "ensure_only" => Some(AssuranceMode::Focus),
            _ => None,
        }
    }
}

impl fmt::Display for AssuranceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssuranceMode::Standard => "standard",
            AssuranceMode::Check => "check",
            AssuranceMode::Enable => "enable",
            AssuranceMode::EnablePrimary => "enable-primary",
            AssuranceMode::Focus => "focus",
        };
        f.write_str(s)
    }
}

/// Where resolution and refresh rate come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    #[default]
    FollowClient,
    FollowPreset,
    Manual,
}

/// Named encoder tuning bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EncoderProfile {
    #[default]
    Balanced,
    Quality,
    Performance,
}

impl fmt::Display for EncoderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncoderProfile::Balanced => write!(f, "balanced"),
            EncoderProfile::Quality => write!(f, "quality"),
            EncoderProfile::Performance => write!(f, "performance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AudioMode {
    #[default]
    ClientOnly,
    HostOnly,
    Both,
}

/// Sampled state of the daemon process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    Offline,
    Online,
    Streaming,
    AuthRequired,
    Unknown,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessStatus::Offline => "OFFLINE",
            ProcessStatus::Online => "ONLINE",
            ProcessStatus::Streaming => "STREAMING",
            ProcessStatus::AuthRequired => "AUTH_REQUIRED",
            ProcessStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Preset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn default_fps() -> u32 {
    60
}

fn default_bitrate() -> u32 {
    20
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfig {
    #[serde(default)]
    pub assurance: AssuranceMode,
    /// Target device identifier, as reported by the display enumerator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub strategy: ResolutionStrategy,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoder_profile: Option<EncoderProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_resolution: Option<Resolution>,
    /// Kept as the literal the daemon expects (e.g. `"59.94"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_refresh_rate: Option<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            assurance: AssuranceMode::default(),
            device_id: None,
            strategy: ResolutionStrategy::default(),
            fps: default_fps(),
            bitrate: default_bitrate(),
            encoder_profile: None,
            manual_resolution: None,
            manual_refresh_rate: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    #[serde(default)]
    pub mode: AudioMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_device_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Discovery broadcast (UPnP).
    #[serde(default)]
    pub upnp: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputConfig {
    #[serde(default = "enabled")]
    pub keyboard: bool,
    #[serde(default = "enabled")]
    pub mouse: bool,
    #[serde(default = "enabled")]
    pub gamepad: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            keyboard: true,
            mouse: true,
            gamepad: true,
        }
    }
}

/// A named, declarative target configuration for the streaming daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: PresetId,
    pub name: String,
    #[serde(default)]
    pub is_read_only: bool,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub inputs: InputConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expert: BTreeMap<String, ExpertValue>,
}

impl Preset {
    /// A preset with every sub-config at its default.
    pub fn new(id: impl Into<PresetId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_read_only: false,
            display: DisplayConfig::default(),
            audio: AudioConfig::default(),
            network: NetworkConfig::default(),
            inputs: InputConfig::default(),
            expert: BTreeMap::new(),
        }
    }

    pub fn has_keep_fields(&self) -> bool {
        self.expert.values().any(|v| matches!(v, ExpertValue::Keep))
    }

    /// The first expert override that cannot be written as a single
    /// `key = value` line, with the reason.
    pub fn invalid_expert_entry(&self) -> Option<(&str, &'static str)> {
        self.expert
            .iter()
            .find_map(|(key, value)| expert_entry_problem(key, value).map(|why| (key.as_str(), why)))
    }
}

/// Why `key = value` would not survive a write/read cycle of the config file,
/// or `None` if it is safe.
pub fn expert_entry_problem(key: &str, value: &ExpertValue) -> Option<&'static str> {
    if key.is_empty() {
        return Some("empty key");
    }
    if key
        .chars()
        .any(|c| c == '=' || c == '#' || c.is_whitespace() || c.is_control())
    {
        return Some("key contains '=', '#', whitespace or a control character");
    }
    let ExpertValue::Literal(v) = value else {
        return None;
    };
    if v.chars().any(char::is_control) {
        return Some("value contains a line break or control character");
    }
    if v.trim() != v {
        return Some("value has leading or trailing whitespace");
    }
    None
}

// ---------------------------------------------------------------------------
// Orphan marker
// ---------------------------------------------------------------------------

/// Recorded mode of a single display before the session started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySnapshot {
    pub width: u32,
    pub height: u32,
    pub frequency: u32,
    #[serde(default)]
    pub primary: bool,
}

/// Pre-session display state written by the external session-start hook.
///
/// Its presence after the daemon stopped means the session-end hook never ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanMarker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<MarkerTimestamp>,
    #[serde(default, deserialize_with = "bool_or_list")]
    pub vdd_was_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_primary: Option<String>,
    #[serde(default)]
    pub initial_displays: HashMap<String, DisplaySnapshot>,
    #[serde(default)]
    pub disabled_displays: Vec<String>,
    #[serde(default)]
    pub display_mode: String,
}

impl OrphanMarker {
    /// Whether the recorded display mode could have moved the primary display.
    pub fn display_mode_changes_primary(&self) -> bool {
        AssuranceMode::parse(&self.display_mode)
            .map(AssuranceMode::changes_primary)
            .unwrap_or(false)
    }
}

/// The hooks have written both epoch numbers and ISO strings here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarkerTimestamp {
    Epoch(i64),
    Text(String),
}

/// Some hook versions serialize booleans as `[]` / `[...]`.
fn bool_or_list<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolLike {
        Bool(bool),
        List(Vec<serde_json::Value>),
        Null(Option<()>),
    }

    Ok(match BoolLike::deserialize(deserializer)? {
        BoolLike::Bool(b) => b,
        BoolLike::List(items) => !items.is_empty(),
        BoolLike::Null(_) => false,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expert_value_keep_marker_roundtrip() {
        let keep: ExpertValue = serde_json::from_str(r#""KEEP""#).expect("keep");
        assert_eq!(keep, ExpertValue::Keep);
        let lit: ExpertValue = serde_json::from_str(r#""info""#).expect("literal");
        assert_eq!(lit, ExpertValue::Literal("info".into()));
        assert_eq!(serde_json::to_string(&ExpertValue::Keep).unwrap(), r#""KEEP""#);
    }

    #[test]
    fn expert_entries_that_break_the_line_format_are_flagged() {
        let lit = |s: &str| ExpertValue::Literal(s.into());
        assert_eq!(expert_entry_problem("capture", &lit("kms")), None);
        assert_eq!(expert_entry_problem("capture", &lit("")), None);
        assert_eq!(expert_entry_problem("capture", &ExpertValue::Keep), None);
        assert!(expert_entry_problem("capture", &lit("kms\nport = 1")).is_some());
        assert!(expert_entry_problem("capture", &lit(" kms")).is_some());
        assert!(expert_entry_problem("", &lit("x")).is_some());
        assert!(expert_entry_problem("a=b", &lit("x")).is_some());
        assert!(expert_entry_problem("#a", &lit("x")).is_some());
        assert!(expert_entry_problem("a\nport", &ExpertValue::Keep).is_some());

        let mut preset = Preset::new("p", "P");
        preset.expert.insert("capture".into(), lit("kms\r\nport = 1"));
        assert_eq!(preset.invalid_expert_entry().map(|(k, _)| k), Some("capture"));
    }

    #[test]
    fn assurance_mode_maps_to_daemon_values() {
        assert_eq!(AssuranceMode::Standard.daemon_value(), "disabled");
        assert_eq!(AssuranceMode::Check.daemon_value(), "verify_only");
        assert_eq!(AssuranceMode::Enable.daemon_value(), "ensure_active");
        assert_eq!(AssuranceMode::EnablePrimary.daemon_value(), "ensure_primary");
        assert_eq!(AssuranceMode::Focus.daemon_value(), "ensure_only");
    }

    #[test]
    fn preset_defaults_fill_missing_sections() {
        let preset: Preset = serde_json::from_str(r#"{"id":"p","name":"P"}"#).expect("parse");
        assert!(!preset.is_read_only);
        assert_eq!(preset.display.fps, 60);
        assert!(preset.inputs.keyboard && preset.inputs.mouse && preset.inputs.gamepad);
        assert!(preset.expert.is_empty());
    }

    #[test]
    fn marker_accepts_list_encoded_booleans() {
        let empty: OrphanMarker =
            serde_json::from_str(r#"{"vddWasEnabled": [], "displayMode": "focus"}"#).unwrap();
        assert!(!empty.vdd_was_enabled);
        let full: OrphanMarker =
            serde_json::from_str(r#"{"vddWasEnabled": [1], "displayMode": "focus"}"#).unwrap();
        assert!(full.vdd_was_enabled);
        let plain: OrphanMarker = serde_json::from_str(r#"{"vddWasEnabled": true}"#).unwrap();
        assert!(plain.vdd_was_enabled);
    }

    #[test]
    fn marker_display_mode_primary_rule() {
        let mut marker: OrphanMarker = serde_json::from_str("{}").unwrap();
        marker.display_mode = "enable-primary".into();
        assert!(marker.display_mode_changes_primary());
        marker.display_mode = "ensure_only".into();
        assert!(marker.display_mode_changes_primary());
        marker.display_mode = "standard".into();
        assert!(!marker.display_mode_changes_primary());
    }

    #[test]
    fn process_status_serializes_screaming_case() {
        assert_eq!(
            serde_json::to_string(&ProcessStatus::AuthRequired).unwrap(),
            r#""AUTH_REQUIRED""#
        );
        assert_eq!(ProcessStatus::Streaming.to_string(), "STREAMING");
    }
}
