//! Start / stop / restart with mutual exclusion and poll-until-state.
//!
//! At most one lifecycle operation is in flight per [`Supervisor`] (clones
//! share the lock). When built from a [`Context`] the supervisor also holds
//! an advisory lock on `run/lifecycle.lock`, so `lumen watch` and a one-off
//! `lumen apply` in another process do not overlap. A caller that cannot
//! get both locks within `lock_wait` fails with [`SupervisorError::Busy`].
//! After issuing a start or stop the supervisor polls process presence
//! every `lifecycle_poll` until the expected state is seen or
//! `lifecycle_deadline` passes.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{sleep, timeout, Instant};

use lumen_core::{paths, Context, Timings};

use crate::error::{io_err, join_err, SupervisorError};
use crate::flags::UserStopFlag;
use crate::process::{ProcessControl, SystemProcess};

const LOCK_FILE_RETRY: Duration = Duration::from_millis(50);

#[derive(Clone)]
pub struct Supervisor {
    control: Arc<dyn ProcessControl>,
    marker_path: PathBuf,
    timings: Timings,
    lock: Arc<Mutex<()>>,
    lock_file: Option<PathBuf>,
    user_stop: Option<UserStopFlag>,
}

/// Both locks, released on drop.
struct LifecycleGuard<'a> {
    _local: MutexGuard<'a, ()>,
    _file: Option<File>,
}

impl Supervisor {
    pub fn new(
        control: Arc<dyn ProcessControl>,
        marker_path: impl Into<PathBuf>,
        timings: Timings,
    ) -> Self {
        Self {
            control,
            marker_path: marker_path.into(),
            timings,
            lock: Arc::new(Mutex::new(())),
            lock_file: None,
            user_stop: None,
        }
    }

    pub fn from_context(ctx: &Context) -> Self {
        Self::new(
            Arc::new(SystemProcess::from_settings(&ctx.settings)),
            ctx.marker_path(),
            ctx.settings.timings.clone(),
        )
        .with_lock_file(paths::lifecycle_lock_path(&ctx.home))
        .with_user_stop(UserStopFlag::at(&ctx.home))
    }

    /// Also serialize lifecycle operations across processes through `path`.
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_file = Some(path.into());
        self
    }

    /// Flag set by [`Supervisor::stop_by_user`] and cleared by every start.
    pub fn with_user_stop(mut self, flag: UserStopFlag) -> Self {
        self.user_stop = Some(flag);
        self
    }

    pub fn control(&self) -> Arc<dyn ProcessControl> {
        self.control.clone()
    }

    pub async fn is_running(&self) -> Result<bool, SupervisorError> {
        let control = self.control.clone();
        tokio::task::spawn_blocking(move || control.is_running())
            .await
            .map_err(|e| join_err("process query", e))?
    }

    pub async fn start(&self) -> Result<(), SupervisorError> {
        let _guard = self.acquire().await?;
        self.start_locked().await
    }

    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let _guard = self.acquire().await?;
        self.stop_locked().await
    }

    /// Stop on the user's behalf so the watchdog does not bring the daemon back.
    ///
    /// The user-stop flag is raised only when a running daemon is actually
    /// being taken down, and dropped again if that fails. Returns `false`
    /// when the daemon was not running.
    pub async fn stop_by_user(&self) -> Result<bool, SupervisorError> {
        let _guard = self.acquire().await?;
        if !self.is_running().await? {
            self.clear_user_stop();
            return Ok(false);
        }
        if let Some(flag) = &self.user_stop {
            flag.set()?;
        }
        if let Err(err) = self.stop_locked().await {
            self.clear_user_stop();
            return Err(err);
        }
        Ok(true)
    }

    /// Stop (if running), let the OS release ports and handles, then start.
    pub async fn restart(&self) -> Result<(), SupervisorError> {
        let _guard = self.acquire().await?;
        if self.is_running().await? {
            self.stop_locked().await?;
            sleep(self.timings.restart_settle()).await;
        }
        self.start_locked().await
    }

    async fn acquire(&self) -> Result<LifecycleGuard<'_>, SupervisorError> {
        let waited = self.timings.lock_wait();
        let deadline = Instant::now() + waited;
        let local = timeout(waited, self.lock.lock())
            .await
            .map_err(|_| SupervisorError::Busy { waited })?;
        let file = match &self.lock_file {
            Some(path) => Some(lock_file_until(path, deadline, waited).await?),
            None => None,
        };
        Ok(LifecycleGuard {
            _local: local,
            _file: file,
        })
    }

    fn clear_user_stop(&self) {
        if let Some(flag) = &self.user_stop {
            flag.take();
        }
    }

    async fn start_locked(&self) -> Result<(), SupervisorError> {
        self.clear_user_stop();
        if self.is_running().await? {
            tracing::info!("daemon already running");
            return Ok(());
        }
        tracing::info!("starting daemon");
        let control = self.control.clone();
        tokio::task::spawn_blocking(move || control.spawn())
            .await
            .map_err(|e| join_err("spawn", e))??;
        self.wait_for(true, "start").await
    }

    async fn stop_locked(&self) -> Result<(), SupervisorError> {
        if !self.is_running().await? {
            tracing::info!("daemon already stopped");
            return Ok(());
        }
        if self.marker_path.exists() {
            let control = self.control.clone();
            let hook = tokio::task::spawn_blocking(move || control.graceful_shutdown())
                .await
                .map_err(|e| join_err("graceful shutdown", e))?;
            if let Err(err) = hook {
                tracing::warn!(error = %err, "graceful shutdown hook failed; terminating anyway");
            }
        }
        tracing::info!("stopping daemon");
        let control = self.control.clone();
        tokio::task::spawn_blocking(move || control.terminate())
            .await
            .map_err(|e| join_err("terminate", e))??;
        self.wait_for(false, "stop").await
    }

    async fn wait_for(&self, running: bool, action: &'static str) -> Result<(), SupervisorError> {
        let waited = self.timings.lifecycle_deadline();
        let deadline = Instant::now() + waited;
        loop {
            match self.is_running().await {
                Ok(observed) if observed == running => {
                    tracing::info!(action, "daemon reached expected state");
                    return Ok(());
                }
                Ok(_) => {}
                Err(err) => tracing::debug!(error = %err, "process query failed while polling"),
            }
            if Instant::now() >= deadline {
                return Err(SupervisorError::ProcessTimeout { action, waited });
            }
            sleep(self.timings.lifecycle_poll()).await;
        }
    }
}

/// Take an exclusive advisory lock on `path`, retrying until `deadline`.
async fn lock_file_until(
    path: &Path,
    deadline: Instant,
    waited: Duration,
) -> Result<File, SupervisorError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(file),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                if Instant::now() >= deadline {
                    return Err(SupervisorError::Busy { waited });
                }
                sleep(LOCK_FILE_RETRY).await;
            }
            Err(e) => return Err(io_err(path, e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
