//! `lumen status`: daemon state, active preset and config file at a glance.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use lumen_apply::snapshot;
use lumen_core::{PresetId, ProcessStatus};
use lumen_supervisor::{HttpProbe, StatusSampler, Supervisor};

/// Arguments for `lumen status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    status: ProcessStatus,
    active_preset_id: Option<PresetId>,
    config_path: PathBuf,
    config_found: bool,
    backups: usize,
    session_marker: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let ctx = super::context()?;
        let supervisor = Supervisor::from_context(&ctx);
        let sampler = StatusSampler::new(
            supervisor.control(),
            ctx.marker_path(),
            HttpProbe::from_settings(&ctx.settings),
        );

        let report = StatusReport {
            status: sampler.sample(),
            active_preset_id: snapshot::read_active(&ctx.export_dir())
                .context("failed to read active preset export")?,
            config_path: ctx.store.path().to_path_buf(),
            config_found: ctx.store.exists(),
            backups: ctx
                .store
                .list_backups()
                .context("failed to list config backups")?
                .len(),
            session_marker: ctx.marker_path().exists(),
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_human(&report);
        Ok(())
    }
}

fn print_human(report: &StatusReport) {
    let status = report.status.to_string();
    let status = match report.status {
        ProcessStatus::Online => status.green().bold(),
        ProcessStatus::Streaming => status.cyan().bold(),
        ProcessStatus::Offline => status.red().bold(),
        ProcessStatus::AuthRequired => status.yellow().bold(),
        ProcessStatus::Unknown => status.bright_black().bold(),
    };
    println!("lumen v{} | daemon {status}", env!("CARGO_PKG_VERSION"));

    let active = report
        .active_preset_id
        .as_ref()
        .map(|id| id.to_string().bold().to_string())
        .unwrap_or_else(|| "none".bright_black().to_string());
    println!("active preset: {active}");

    let config = if report.config_found {
        report.config_path.display().to_string()
    } else {
        format!("{} (missing)", report.config_path.display())
            .red()
            .to_string()
    };
    println!("config:        {config} ({} backups)", report.backups);

    if report.session_marker {
        println!("session marker present");
    }
}
