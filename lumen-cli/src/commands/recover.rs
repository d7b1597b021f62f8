//! `lumen recover`: run crash recovery now, if a session marker is left over.

use anyhow::{Context, Result};
use colored::Colorize;

use lumen_supervisor::{init_tracing, recover_blocking, StepOutcome};

pub fn run() -> Result<()> {
    init_tracing();
    let ctx = super::context()?;
    let report = super::block_on(recover_blocking(ctx))?.context("recovery failed")?;

    if !report.marker_found {
        println!("No session marker found; nothing to recover.");
        return Ok(());
    }

    for step in &report.steps {
        match &step.outcome {
            StepOutcome::Done => println!("  {} {}", "✓".green(), step.action),
            StepOutcome::Failed(detail) => println!("  {} {} ({detail})", "✗".red(), step.action),
            StepOutcome::Skipped(reason) => {
                println!("  {} {} ({reason})", "·".bright_black(), step.action)
            }
        }
    }
    if report.recovery_incomplete {
        println!("{}", "Recovery incomplete: exported daemon config was missing.".yellow());
    }
    if report.marker_removed {
        println!("✓ session marker removed");
    }
    Ok(())
}
