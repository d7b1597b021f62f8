//! Sampling the daemon's [`ProcessStatus`].
//!
//! | observation                              | status          |
//! |------------------------------------------|-----------------|
//! | process query failed                     | `UNKNOWN`       |
//! | process absent                           | `OFFLINE`       |
//! | process present, session marker present  | `STREAMING`     |
//! | present, HTTP probe answered 401         | `AUTH_REQUIRED` |
//! | present, HTTP probe transport error      | `UNKNOWN`       |
//! | present, HTTP probe answered otherwise   | `ONLINE`        |
//! | present, no probe configured             | `ONLINE`        |

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lumen_core::types::ProcessStatus;
use lumen_core::Settings;

use crate::process::ProcessControl;

pub const PROBE_USER_ENV: &str = "LUMEN_PROBE_USER";
pub const PROBE_PASSWORD_ENV: &str = "LUMEN_PROBE_PASSWORD";

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// HTTP liveness probe against the daemon's web endpoint.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
}

impl HttpProbe {
    /// Build from settings, taking credentials from the environment.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let url = settings.status_probe_url.as_deref()?;
        let user = std::env::var(PROBE_USER_ENV).ok();
        let password = std::env::var(PROBE_PASSWORD_ENV).ok();
        Some(Self::new(url, user.as_deref(), password.as_deref()))
    }

    /// Credentials are carried as URL userinfo, which the HTTP client sends
    /// as basic auth.
    pub fn new(url: &str, user: Option<&str>, password: Option<&str>) -> Self {
        let url = match (user, url.split_once("://")) {
            (Some(user), Some((scheme, rest))) if !user.is_empty() => {
                let password = password.unwrap_or_default();
                format!(
                    "{scheme}://{}:{}@{rest}",
                    escape_userinfo(user),
                    escape_userinfo(password)
                )
            }
            _ => url.to_string(),
        };
        Self { url }
    }

    pub fn check(&self) -> ProcessStatus {
        let agent = ureq::AgentBuilder::new().timeout(PROBE_TIMEOUT).build();
        match agent.get(&self.url).call() {
            Ok(_) => ProcessStatus::Online,
            Err(ureq::Error::Status(401, _)) => ProcessStatus::AuthRequired,
            // Any other HTTP answer still proves the daemon is serving.
            Err(ureq::Error::Status(_, _)) => ProcessStatus::Online,
            Err(ureq::Error::Transport(err)) => {
                tracing::debug!(error = %err, "status probe transport error");
                ProcessStatus::Unknown
            }
        }
    }
}

fn escape_userinfo(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

/// Combines process presence, the session marker and the optional probe.
#[derive(Clone)]
pub struct StatusSampler {
    control: Arc<dyn ProcessControl>,
    marker_path: PathBuf,
    probe: Option<HttpProbe>,
}

impl StatusSampler {
    pub fn new(
        control: Arc<dyn ProcessControl>,
        marker_path: impl Into<PathBuf>,
        probe: Option<HttpProbe>,
    ) -> Self {
        Self {
            control,
            marker_path: marker_path.into(),
            probe,
        }
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Blocking; call from `spawn_blocking` inside the runtime.
    pub fn sample(&self) -> ProcessStatus {
        match self.control.is_running() {
            Err(err) => {
                tracing::warn!(error = %err, "process query failed");
                ProcessStatus::Unknown
            }
            Ok(false) => ProcessStatus::Offline,
            Ok(true) if self.marker_path.exists() => ProcessStatus::Streaming,
            Ok(true) => self
                .probe
                .as_ref()
                .map(HttpProbe::check)
                .unwrap_or(ProcessStatus::Online),
        }
    }
}
