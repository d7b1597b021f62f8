//! `lumen diff <id>`: unified diff of what `apply` would write.

use anyhow::{Context, Result};
use clap::Args;

use lumen_apply::diff;

/// Arguments for `lumen diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Preset id to compare against the live config.
    pub id: String,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let ctx = super::context()?;
        let preset = super::load_preset(&ctx, &self.id)?;

        let result = diff(&ctx.store, &preset)
            .with_context(|| format!("diff failed for '{}'", self.id))?;

        if result.is_empty() {
            println!("No differences for '{}'.", self.id);
            return Ok(());
        }

        print!("{}", result.unified_diff);
        if !result.unified_diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
