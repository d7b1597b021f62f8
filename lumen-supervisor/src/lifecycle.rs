//! Apply a preset, then restart the daemon so it picks the config up.

use std::path::PathBuf;

use lumen_apply::{apply, resync, ApplyOptions, ApplyReport, ResyncOutcome};
use lumen_core::{Context, Preset};

use crate::error::{join_err, SupervisorError};
use crate::supervisor::Supervisor;

#[derive(Debug, Clone, Copy)]
pub struct ApplyRestartOptions {
    pub dry_run: bool,
    /// Restart the daemon after a successful write.
    pub restart: bool,
    /// Restore the newest backup if the restart fails.
    pub rollback: bool,
}

impl Default for ApplyRestartOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            restart: true,
            rollback: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApplyRestartReport {
    pub apply: ApplyReport,
    pub restarted: bool,
    /// `None` on dry runs or when the post-apply resync failed.
    pub resync: Option<ResyncOutcome>,
}

/// Apply `preset` and restart the daemon.
///
/// A failed restart after a successful write is reported as
/// [`SupervisorError::PartialApply`]; with `rollback` set the backup taken
/// by this apply is restored first. No backup means no rollback.
pub async fn apply_and_restart(
    ctx: &Context,
    supervisor: &Supervisor,
    preset: &Preset,
    options: ApplyRestartOptions,
) -> Result<ApplyRestartReport, SupervisorError> {
    let report = {
        let store = ctx.store.clone();
        let preset = preset.clone();
        let apply_options = ApplyOptions {
            dry_run: options.dry_run,
            observed: None,
        };
        tokio::task::spawn_blocking(move || apply(&store, &preset, &apply_options))
            .await
            .map_err(|e| join_err("apply", e))??
    };

    if options.dry_run {
        return Ok(ApplyRestartReport {
            apply: report,
            restarted: false,
            resync: None,
        });
    }

    tracing::info!(preset = %preset.id, changed = report.changed(), "preset applied");

    let restarted = if options.restart {
        if let Err(err) = supervisor.restart().await {
            let rolled_back = options.rollback && rollback(ctx, report.backup.clone()).await;
            return Err(SupervisorError::PartialApply {
                preset: preset.id.to_string(),
                rolled_back,
                source: Box::new(err),
            });
        }
        true
    } else {
        false
    };

    let resync = {
        let ctx = ctx.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let library = ctx.presets()?;
            resync(&ctx, &library.presets).map_err(SupervisorError::from)
        })
        .await
        .map_err(|e| join_err("resync", e))?;
        match outcome {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                tracing::warn!(error = %err, "resync after apply failed");
                None
            }
        }
    };

    Ok(ApplyRestartReport {
        apply: report,
        restarted,
        resync,
    })
}

async fn rollback(ctx: &Context, backup: Option<PathBuf>) -> bool {
    let Some(backup) = backup else {
        tracing::error!("restart failed and no backup was taken before the write; not rolling back");
        return false;
    };
    let store = ctx.store.clone();
    let restored = backup.clone();
    match tokio::task::spawn_blocking(move || store.restore(&restored)).await {
        Ok(Ok(())) => {
            tracing::warn!(backup = %backup.display(), "restart failed; config rolled back");
            true
        }
        Ok(Err(err)) => {
            tracing::error!(error = %err, "restart failed and rollback failed");
            false
        }
        Err(err) => {
            tracing::error!(error = %err, "rollback task failed");
            false
        }
    }
}
