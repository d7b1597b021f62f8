//! `lumen apply <id> [--dry-run] [--no-restart] [--rollback]`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use lumen_apply::WriteResult;
use lumen_supervisor::{apply_and_restart, init_tracing, ApplyRestartOptions, Supervisor};

/// Arguments for `lumen apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Preset id to apply.
    pub id: String,

    /// Show what would change without writing or restarting.
    #[arg(long)]
    pub dry_run: bool,

    /// Write the config but leave the daemon running as is.
    #[arg(long)]
    pub no_restart: bool,

    /// Restore the newest config backup if the restart fails.
    #[arg(long)]
    pub rollback: bool,
}

impl ApplyArgs {
    pub fn run(self) -> Result<()> {
        if !self.dry_run {
            init_tracing();
        }
        let ctx = super::context()?;
        let preset = super::load_preset(&ctx, &self.id)?;
        let supervisor = Supervisor::from_context(&ctx);
        let options = ApplyRestartOptions {
            dry_run: self.dry_run,
            restart: !self.no_restart,
            rollback: self.rollback,
        };

        let report = super::block_on(apply_and_restart(&ctx, &supervisor, &preset, options))?
            .with_context(|| format!("failed to apply preset '{}'", self.id))?;

        print_results(&self.id, &report.apply.writes, self.dry_run);
        if report.restarted {
            println!("✓ daemon restarted");
        }
        if let Some(resync) = report.resync {
            match resync.active {
                Some(active) => println!("active preset: {}", active.to_string().bold()),
                None => println!("active preset: {}", "none".bright_black()),
            }
        }
        Ok(())
    }
}

fn print_results(preset_id: &str, writes: &[WriteResult], dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let changed: Vec<_> = writes.iter().filter(|w| w.is_change()).collect();

    if changed.is_empty() {
        println!("{prefix}✓ '{preset_id}': config already up to date");
        return;
    }

    println!(
        "{prefix}✓ '{preset_id}' applied ({} changed, {} unchanged)",
        changed.len(),
        writes.len() - changed.len()
    );
    for write in changed {
        match write {
            WriteResult::Written { key, value } => println!("  ✎  {key} = {value}"),
            WriteResult::WouldWrite { key, value } => println!("  ~  {key} = {value}"),
            WriteResult::Deleted { key } => println!("  ✗  {key}"),
            WriteResult::WouldDelete { key } => println!("  -  {key}"),
            WriteResult::Unchanged { .. } => {}
        }
    }
}
