//! Compensation for a session that ended without its session-end hook.
//!
//! The session-start hook leaves an [`OrphanMarker`] describing the display
//! state before the session. If the daemon is gone and the marker is still
//! there, [`recover`] puts the displays back. Every step is independent and
//! best-effort; the marker is removed on every exit path.

use std::path::Path;

use lumen_core::settings::CommandLine;
use lumen_core::types::DisplaySnapshot;
use lumen_core::{OrphanMarker, Settings};

use crate::error::SupervisorError;
use crate::process;

/// Display operations needed to undo a session's changes.
pub trait DisplayControl: Send + Sync {
    fn enable(&self, display: &str) -> Result<(), SupervisorError>;
    fn set_mode(&self, display: &str, mode: &DisplaySnapshot) -> Result<(), SupervisorError>;
    fn set_primary(&self, display: &str) -> Result<(), SupervisorError>;
    fn set_virtual_display(&self, enabled: bool) -> Result<(), SupervisorError>;
}

/// Drives the configured display helper:
///
/// ```text
/// <tool> enable <display>
/// <tool> mode <display> <width> <height> <hz>
/// <tool> primary <display>
/// <tool> virtual on|off
/// ```
#[derive(Debug, Clone)]
pub struct CommandDisplayControl {
    tool: CommandLine,
}

impl CommandDisplayControl {
    pub fn new(tool: CommandLine) -> Self {
        Self { tool }
    }

    pub fn from_settings(settings: &Settings) -> Option<Self> {
        settings.display_tool.clone().map(Self::new)
    }

    fn invoke(&self, args: &[String]) -> Result<(), SupervisorError> {
        let mut command = self.tool.clone();
        command.extend_from_slice(args);
        process::run(&command)
    }
}

impl DisplayControl for CommandDisplayControl {
    fn enable(&self, display: &str) -> Result<(), SupervisorError> {
        self.invoke(&["enable".into(), display.into()])
    }

    fn set_mode(&self, display: &str, mode: &DisplaySnapshot) -> Result<(), SupervisorError> {
        self.invoke(&[
            "mode".into(),
            display.into(),
            mode.width.to_string(),
            mode.height.to_string(),
            mode.frequency.to_string(),
        ])
    }

    fn set_primary(&self, display: &str) -> Result<(), SupervisorError> {
        self.invoke(&["primary".into(), display.into()])
    }

    fn set_virtual_display(&self, enabled: bool) -> Result<(), SupervisorError> {
        let state = if enabled { "on" } else { "off" };
        self.invoke(&["virtual".into(), state.into()])
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryStep {
    pub action: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub marker_found: bool,
    pub steps: Vec<RecoveryStep>,
    /// Marker present but the exported daemon config was missing.
    pub recovery_incomplete: bool,
    pub marker_removed: bool,
}

impl RecoveryReport {
    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
            .count()
    }

    fn record(&mut self, action: String, result: Result<(), SupervisorError>) {
        let outcome = match result {
            Ok(()) => {
                tracing::info!(action = %action, "recovery step done");
                StepOutcome::Done
            }
            Err(err) => {
                tracing::warn!(action = %action, error = %err, "recovery step failed");
                StepOutcome::Failed(err.to_string())
            }
        };
        self.steps.push(RecoveryStep { action, outcome });
    }

    fn skip(&mut self, action: String, reason: &str) {
        tracing::info!(action = %action, reason, "recovery step skipped");
        self.steps.push(RecoveryStep {
            action,
            outcome: StepOutcome::Skipped(reason.to_string()),
        });
    }
}

// ---------------------------------------------------------------------------
// Marker guard
// ---------------------------------------------------------------------------

/// Removes the marker when dropped, whatever happened in between.
struct MarkerGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> MarkerGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn finish(mut self) -> bool {
        self.armed = false;
        remove_marker(self.path)
    }
}

impl Drop for MarkerGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            remove_marker(self.path);
        }
    }
}

fn remove_marker(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove session marker");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// Undo the display changes recorded in the marker at `marker_path`.
///
/// `companion_config` is the exported daemon config; when it is missing the
/// display steps still run and the report is flagged incomplete. Without a
/// display helper every display step is reported as skipped.
pub fn recover(
    marker_path: &Path,
    companion_config: &Path,
    display: Option<&dyn DisplayControl>,
) -> RecoveryReport {
    let mut report = RecoveryReport::default();
    if !marker_path.exists() {
        return report;
    }
    report.marker_found = true;
    let guard = MarkerGuard::new(marker_path);

    tracing::warn!(marker = %marker_path.display(), "orphaned session marker found; recovering");

    let marker = match read_marker(marker_path) {
        Ok(marker) => marker,
        Err(err) => {
            report.record("read session marker".to_string(), Err(err));
            report.marker_removed = guard.finish();
            return report;
        }
    };

    if !companion_config.exists() {
        tracing::warn!(
            path = %companion_config.display(),
            "exported daemon config missing; recovery is partial"
        );
        report.recovery_incomplete = true;
    }

    run_display_steps(&mut report, &marker, display);

    report.marker_removed = guard.finish();
    report
}

fn read_marker(path: &Path) -> Result<OrphanMarker, SupervisorError> {
    let text = std::fs::read_to_string(path).map_err(|e| crate::error::io_err(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

fn run_display_steps(
    report: &mut RecoveryReport,
    marker: &OrphanMarker,
    display: Option<&dyn DisplayControl>,
) {
    let mut displays: Vec<(&String, &DisplaySnapshot)> = marker.initial_displays.iter().collect();
    displays.sort_by(|a, b| a.0.cmp(b.0));

    let Some(display) = display else {
        const NO_TOOL: &str = "no display tool configured";
        for name in &marker.disabled_displays {
            report.skip(format!("enable {name}"), NO_TOOL);
        }
        for (name, _) in &displays {
            report.skip(format!("restore mode of {name}"), NO_TOOL);
        }
        if let (true, Some(primary)) = (
            marker.display_mode_changes_primary(),
            marker.initial_primary.as_deref(),
        ) {
            report.skip(format!("restore primary {primary}"), NO_TOOL);
        }
        if !marker.vdd_was_enabled {
            report.skip("disable virtual display".to_string(), NO_TOOL);
        }
        return;
    };

    for name in &marker.disabled_displays {
        report.record(format!("enable {name}"), display.enable(name));
    }

    for (name, mode) in &displays {
        report.record(
            format!(
                "restore mode of {name} to {}x{}@{}",
                mode.width, mode.height, mode.frequency
            ),
            display.set_mode(name, mode),
        );
    }

    match marker.initial_primary.as_deref() {
        Some(primary) if marker.display_mode_changes_primary() => {
            report.record(format!("restore primary {primary}"), display.set_primary(primary));
        }
        Some(primary) => report.skip(
            format!("restore primary {primary}"),
            "display mode did not change the primary",
        ),
        None => {}
    }

    if !marker.vdd_was_enabled {
        report.record(
            "disable virtual display".to_string(),
            display.set_virtual_display(false),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail_enable: bool,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
        fn push(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl DisplayControl for Recorder {
        fn enable(&self, display: &str) -> Result<(), SupervisorError> {
            self.push(format!("enable {display}"));
            if self.fail_enable {
                return Err(SupervisorError::Command {
                    program: "displayctl".into(),
                    detail: "no such display".into(),
                });
            }
            Ok(())
        }
        fn set_mode(&self, display: &str, mode: &DisplaySnapshot) -> Result<(), SupervisorError> {
            self.push(format!("mode {display} {}x{}@{}", mode.width, mode.height, mode.frequency));
            Ok(())
        }
        fn set_primary(&self, display: &str) -> Result<(), SupervisorError> {
            self.push(format!("primary {display}"));
            Ok(())
        }
        fn set_virtual_display(&self, enabled: bool) -> Result<(), SupervisorError> {
            self.push(format!("virtual {enabled}"));
            Ok(())
        }
    }

    const MARKER: &str = r#"{
        "timestamp": 1718000000,
        "vddWasEnabled": [],
        "initialPrimary": "DISPLAY1",
        "initialDisplays": {
            "DISPLAY2": {"width": 1920, "height": 1080, "frequency": 60},
            "DISPLAY1": {"width": 2560, "height": 1440, "frequency": 144, "primary": true}
        },
        "disabledDisplays": ["DISPLAY2"],
        "displayMode": "focus"
    }"#;

    fn setup(marker: &str, with_companion: bool) -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let marker_path = dir.path().join("session-marker.json");
        std::fs::write(&marker_path, marker).unwrap();
        let companion = dir.path().join("daemon-config.json");
        if with_companion {
            std::fs::write(&companion, "{}").unwrap();
        }
        (dir, marker_path, companion)
    }

    #[test]
    fn no_marker_means_nothing_to_do() {
        let dir = TempDir::new().unwrap();
        let report = recover(&dir.path().join("missing.json"), &dir.path().join("c.json"), None);
        assert!(!report.marker_found);
        assert!(report.steps.is_empty());
    }

    #[test]
    fn full_recovery_runs_every_step_in_order() {
        let (_dir, marker, companion) = setup(MARKER, true);
        let recorder = Recorder::default();

        let report = recover(&marker, &companion, Some(&recorder));

        assert_eq!(
            recorder.calls(),
            vec![
                "enable DISPLAY2",
                "mode DISPLAY1 2560x1440@144",
                "mode DISPLAY2 1920x1080@60",
                "primary DISPLAY1",
                "virtual false",
            ]
        );
        assert!(!report.recovery_incomplete);
        assert!(report.marker_removed);
        assert!(!marker.exists());
    }

    #[test]
    fn failed_step_does_not_stop_the_rest() {
        let (_dir, marker, companion) = setup(MARKER, true);
        let recorder = Recorder {
            fail_enable: true,
            ..Default::default()
        };

        let report = recover(&marker, &companion, Some(&recorder));

        assert_eq!(report.failures(), 1);
        assert_eq!(recorder.calls().len(), 5);
        assert!(!marker.exists());
    }

    #[test]
    fn primary_left_alone_when_mode_does_not_move_it() {
        let marker_json = MARKER.replace("\"focus\"", "\"standard\"").replace("[]", "true");
        let (_dir, marker, companion) = setup(&marker_json, true);
        let recorder = Recorder::default();

        let report = recover(&marker, &companion, Some(&recorder));

        let calls = recorder.calls();
        assert!(!calls.iter().any(|c| c.starts_with("primary")));
        assert!(!calls.iter().any(|c| c.starts_with("virtual")));
        assert!(report
            .steps
            .iter()
            .any(|s| matches!(s.outcome, StepOutcome::Skipped(_))));
    }

    #[test]
    fn missing_companion_config_is_incomplete_but_marker_is_removed() {
        let (_dir, marker, companion) = setup(MARKER, false);

        let report = recover(&marker, &companion, None);

        assert!(report.marker_found);
        assert!(report.recovery_incomplete);
        assert!(report.marker_removed);
        assert!(!marker.exists());
    }

    #[test]
    fn unreadable_marker_is_still_removed() {
        let (_dir, marker, companion) = setup("{not json", true);

        let report = recover(&marker, &companion, None);

        assert_eq!(report.failures(), 1);
        assert!(!marker.exists());
    }
}
