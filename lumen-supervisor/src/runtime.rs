use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};

use lumen_apply::{resync, snapshot, ResyncOutcome};
use lumen_core::{paths, Context};

use crate::error::{io_err, join_err, SupervisorError};
use crate::flags::UserStopFlag;
use crate::recovery::{recover, CommandDisplayControl, DisplayControl, RecoveryReport};
use crate::status::{HttpProbe, StatusSampler};
use crate::supervisor::Supervisor;
use crate::watchdog::{TimerFired, TimerKind, Watchdog, WatchdogAction};

/// Debounce entries older than this are forgotten.
const DEBOUNCE_RETENTION: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
struct ResyncJob {
    source: &'static str,
}

/// Start the watch runtime and block the current thread until it exits.
pub fn start_blocking(ctx: Context) -> Result<(), SupervisorError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(ctx))
}

/// Run the watch runtime: startup recovery, status loop with watchdog,
/// config watcher and resync processor, until ctrl-c.
pub async fn run(ctx: Context) -> Result<(), SupervisorError> {
    ensure_runtime_dirs(&ctx.home)?;

    let supervisor = Supervisor::from_context(&ctx);

    if ctx.marker_path().exists() && !supervisor.is_running().await? {
        let report = recover_blocking(ctx.clone()).await?;
        log_recovery(&report);
    }

    let (resync_tx, resync_rx) = mpsc::channel::<ResyncJob>(16);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    // Initial reconciliation happens before any event is observed.
    resync_tx
        .send(ResyncJob { source: "startup" })
        .await
        .map_err(|_| SupervisorError::ChannelClosed("resync queue"))?;

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let result = resync_processor_task(ctx, resync_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let status_handle = {
        let shutdown = shutdown_tx.clone();
        let ctx = ctx.clone();
        let supervisor = supervisor.clone();
        let resync_tx = resync_tx.clone();
        tokio::spawn(async move {
            let result = status_task(ctx, supervisor, resync_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let ctx = ctx.clone();
        let resync_tx = resync_tx.clone();
        tokio::spawn(async move {
            let result = watcher_task(ctx, resync_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(io_err("ctrl-c handler", err)),
                    }
                }
            }
        })
    };

    drop(resync_tx);

    let (processor_result, status_result, watcher_result, signal_result) =
        tokio::join!(processor_handle, status_handle, watcher_handle, signal_handle);

    handle_join("resync_processor", processor_result)?;
    handle_join("status", status_result)?;
    handle_join("config_watcher", watcher_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// One-off crash recovery, as `lumen recover` runs it.
pub async fn recover_blocking(ctx: Context) -> Result<RecoveryReport, SupervisorError> {
    tokio::task::spawn_blocking(move || recover_now(&ctx))
        .await
        .map_err(|e| join_err("recovery", e))
}

fn recover_now(ctx: &Context) -> RecoveryReport {
    let display = CommandDisplayControl::from_settings(&ctx.settings);
    let companion = snapshot::config_path(&ctx.export_dir());
    recover(
        ctx.marker_path(),
        &companion,
        display.as_ref().map(|d| d as &dyn DisplayControl),
    )
}

/// `spawn_blocking` for work a long-lived task repeats: a job that panics is
/// logged and yields `None` so the caller keeps looping.
async fn run_blocking_logged<T, F>(job_name: &'static str, job: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::error!(job = job_name, error = %err, "blocking job failed");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

async fn status_task(
    ctx: Context,
    supervisor: Supervisor,
    resync_tx: mpsc::Sender<ResyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), SupervisorError> {
    let sampler = StatusSampler::new(
        supervisor.control(),
        ctx.marker_path(),
        HttpProbe::from_settings(&ctx.settings),
    );
    let (fired_tx, mut fired_rx) = mpsc::channel::<TimerFired>(8);
    let mut watchdog = Watchdog::new(
        &ctx.settings.timings,
        UserStopFlag::at(&ctx.home),
        fired_tx,
    );

    let mut ticker = tokio::time::interval(ctx.settings.timings.status_poll());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                let sampler = sampler.clone();
                let Some(status) = run_blocking_logged("status sample", move || sampler.sample()).await else {
                    continue;
                };
                for action in watchdog.observe(status) {
                    match action {
                        WatchdogAction::Resync => {
                            enqueue_resync(&resync_tx, "came-online").await?;
                        }
                    }
                }
            }
            Some(fired) = fired_rx.recv() => {
                if !watchdog.claim(fired) {
                    tracing::debug!(?fired, "stale timer ignored");
                    continue;
                }
                match fired.kind {
                    TimerKind::Recovery => {
                        if !ctx.marker_path().exists() {
                            tracing::debug!("session ended cleanly; nothing to recover");
                            continue;
                        }
                        let ctx = ctx.clone();
                        if let Some(report) = run_blocking_logged("recovery", move || recover_now(&ctx)).await {
                            log_recovery(&report);
                        }
                    }
                    TimerKind::Restart => {
                        let supervisor = supervisor.clone();
                        tokio::spawn(async move {
                            tracing::warn!("watchdog restarting daemon");
                            if let Err(err) = supervisor.restart().await {
                                tracing::error!(error = %err, "watchdog restart failed");
                            }
                        });
                    }
                }
            }
        }
    }

    watchdog.shutdown();
    Ok(())
}

async fn resync_processor_task(
    ctx: Context,
    mut resync_rx: mpsc::Receiver<ResyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), SupervisorError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = resync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();
                let ctx = ctx.clone();
                let Some(result) = run_blocking_logged("resync", move || run_resync(&ctx)).await else {
                    continue;
                };

                match result {
                    Ok(outcome) => tracing::info!(
                        source = job.source,
                        active = outcome.active.as_ref().map(|id| id.0.as_str()).unwrap_or("none"),
                        matches = outcome.matches.len(),
                        changed = outcome.changed(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        "resync completed",
                    ),
                    Err(err) => tracing::warn!(source = job.source, error = %err, "resync failed"),
                }
            }
        }
    }

    Ok(())
}

fn run_resync(ctx: &Context) -> Result<ResyncOutcome, SupervisorError> {
    let library = ctx.presets()?;
    Ok(resync(ctx, &library.presets)?)
}

async fn watcher_task(
    ctx: Context,
    resync_tx: mpsc::Sender<ResyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), SupervisorError> {
    let config_path = ctx.store.path().to_path_buf();
    let Some(watch_dir) = config_path.parent().filter(|dir| dir.is_dir()) else {
        tracing::warn!(
            path = %config_path.display(),
            "daemon config directory does not exist; external edits will not be tracked"
        );
        let _ = shutdown_rx.recv().await;
        return Ok(());
    };
    let Some(file_name) = config_path.file_name().map(|n| n.to_os_string()) else {
        let _ = shutdown_rx.recv().await;
        return Ok(());
    };

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut _watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    _watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    tracing::info!(path = %config_path.display(), "watching daemon config");

    let threshold = ctx.settings.timings.config_debounce();
    let mut debounce = HashMap::<PathBuf, Instant>::new();
    let mut last_fingerprint = config_fingerprint(&config_path)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }
                let touches_config = event
                    .paths
                    .iter()
                    .any(|path| path.file_name() == Some(file_name.as_os_str()));
                if !touches_config {
                    continue;
                }
                if !should_process_event(&mut debounce, &config_path, Instant::now(), threshold) {
                    continue;
                }

                let fingerprint = config_fingerprint(&config_path)?;
                if fingerprint == last_fingerprint {
                    tracing::debug!("config event without content change");
                    continue;
                }
                last_fingerprint = fingerprint;
                enqueue_resync(&resync_tx, "config-watcher").await?;
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn enqueue_resync(
    resync_tx: &mpsc::Sender<ResyncJob>,
    source: &'static str,
) -> Result<(), SupervisorError> {
    resync_tx
        .send(ResyncJob { source })
        .await
        .map_err(|_| SupervisorError::ChannelClosed("resync queue"))
}

/// `None` while the file does not exist.
fn config_fingerprint(path: &Path) -> Result<Option<String>, SupervisorError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(snapshot::fingerprint(&text))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

fn log_recovery(report: &RecoveryReport) {
    if !report.marker_found {
        return;
    }
    tracing::info!(
        steps = report.steps.len(),
        failures = report.failures(),
        incomplete = report.recovery_incomplete,
        marker_removed = report.marker_removed,
        "crash recovery finished",
    );
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn should_process_event(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
    threshold: Duration,
) -> bool {
    debounce.retain(|_, seen_at| now.duration_since(*seen_at) <= DEBOUNCE_RETENTION);
    match debounce.get(path) {
        Some(last_seen) if now.duration_since(*last_seen) < threshold => false,
        _ => {
            debounce.insert(path.to_path_buf(), now);
            true
        }
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), SupervisorError> {
    for dir in [paths::export_dir(home), paths::run_dir(home)] {
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
    }
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), SupervisorError>, tokio::task::JoinError>,
) -> Result<(), SupervisorError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(join_err(task, err)),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
