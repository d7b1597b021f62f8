//! Host-process control for the streaming daemon.
//!
//! [`ProcessControl`] is the seam between the supervisor's state machine and
//! the OS. [`SystemProcess`] drives the real daemon through external
//! commands; tests substitute an in-memory fake.

use std::process::{Command, Output, Stdio};

use lumen_core::settings::CommandLine;
use lumen_core::Settings;

use crate::error::SupervisorError;

/// Blocking process operations. Implementations must be cheap to call
/// repeatedly; the supervisor polls `is_running` while waiting for a state.
pub trait ProcessControl: Send + Sync {
    fn is_running(&self) -> Result<bool, SupervisorError>;

    /// Launch the daemon detached from the caller.
    fn spawn(&self) -> Result<(), SupervisorError>;

    /// Ask the OS to end the daemon.
    fn terminate(&self) -> Result<(), SupervisorError>;

    /// Let the daemon unwind an in-progress session before it is terminated.
    fn graceful_shutdown(&self) -> Result<(), SupervisorError> {
        Ok(())
    }
}

/// The real daemon, found by process name.
#[derive(Debug, Clone)]
pub struct SystemProcess {
    process_name: String,
    start_command: CommandLine,
    stop_command: Option<CommandLine>,
    session_end_hook: Option<CommandLine>,
}

impl SystemProcess {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            process_name: settings.process_name.clone(),
            start_command: settings.start_command.clone(),
            stop_command: settings.stop_command.clone(),
            session_end_hook: settings.session_end_hook.clone(),
        }
    }
}

impl ProcessControl for SystemProcess {
    #[cfg(not(windows))]
    fn is_running(&self) -> Result<bool, SupervisorError> {
        let output = output(&["pgrep", "-x", self.process_name.as_str()])?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(command_failed("pgrep", &output)),
        }
    }

    #[cfg(windows)]
    fn is_running(&self) -> Result<bool, SupervisorError> {
        let filter = format!("IMAGENAME eq {}.exe", self.process_name);
        let output = output(&["tasklist", "/FI", filter.as_str(), "/NH"])?;
        if !output.status.success() {
            return Err(command_failed("tasklist", &output));
        }
        let stdout = String::from_utf8_lossy(&output.stdout).to_lowercase();
        Ok(stdout.contains(&self.process_name.to_lowercase()))
    }

    fn spawn(&self) -> Result<(), SupervisorError> {
        let (program, args) = split(&self.start_command)?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SupervisorError::Command {
                program: program.to_string(),
                detail: e.to_string(),
            })?;
        // Reap the child when it exits so it never lingers as a zombie.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }

    fn terminate(&self) -> Result<(), SupervisorError> {
        if let Some(stop) = &self.stop_command {
            return run(stop);
        }
        terminate_by_name(&self.process_name)
    }

    fn graceful_shutdown(&self) -> Result<(), SupervisorError> {
        match &self.session_end_hook {
            Some(hook) => run(hook),
            None => Ok(()),
        }
    }
}

#[cfg(not(windows))]
fn terminate_by_name(name: &str) -> Result<(), SupervisorError> {
    let output = output(&["pkill", "-x", name])?;
    match output.status.code() {
        // 1 = nothing matched; already gone.
        Some(0) | Some(1) => Ok(()),
        _ => Err(command_failed("pkill", &output)),
    }
}

#[cfg(windows)]
fn terminate_by_name(name: &str) -> Result<(), SupervisorError> {
    let image = format!("{name}.exe");
    run(&["taskkill".to_string(), "/IM".to_string(), image, "/F".to_string()])
}

// ---------------------------------------------------------------------------
// Command helpers
// ---------------------------------------------------------------------------

/// Run a configured command to completion; non-zero exit is an error.
pub(crate) fn run(command: &[String]) -> Result<(), SupervisorError> {
    let (program, args) = split(command)?;
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| SupervisorError::Command {
            program: program.to_string(),
            detail: e.to_string(),
        })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(command_failed(program, &output))
    }
}

fn output(command: &[&str]) -> Result<Output, SupervisorError> {
    let (program, args) = command.split_first().ok_or_else(|| SupervisorError::Command {
        program: String::new(),
        detail: "empty command".to_string(),
    })?;
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| SupervisorError::Command {
            program: program.to_string(),
            detail: e.to_string(),
        })
}

fn split(command: &[String]) -> Result<(&str, &[String]), SupervisorError> {
    match command.split_first() {
        Some((program, args)) if !program.is_empty() => Ok((program.as_str(), args)),
        _ => Err(SupervisorError::Command {
            program: String::new(),
            detail: "empty command line in settings".to_string(),
        }),
    }
}

fn command_failed(program: &str, output: &Output) -> SupervisorError {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    SupervisorError::Command {
        program: program.to_string(),
        detail: if stderr.is_empty() {
            format!("exited with {}", output.status)
        } else {
            format!("exited with {}: {stderr}", output.status)
        },
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn run_reports_exit_status_and_stderr() {
        let err = run(&["sh".into(), "-c".into(), "echo nope >&2; exit 3".into()]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("sh"), "{msg}");
        assert!(msg.contains("nope"), "{msg}");
    }

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(matches!(run(&[]), Err(SupervisorError::Command { .. })));
    }

    #[test]
    fn successful_command_is_ok() {
        run(&["true".into()]).expect("true exits 0");
    }
}
