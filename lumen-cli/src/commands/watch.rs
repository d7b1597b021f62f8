//! `lumen watch`: foreground status watchdog and config watcher.

use anyhow::{Context, Result};

pub fn run() -> Result<()> {
    let ctx = super::context()?;
    lumen_supervisor::start_blocking(ctx).context("watch runtime exited with error")
}
