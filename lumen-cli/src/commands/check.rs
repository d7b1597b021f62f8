//! `lumen check <id>`: field-level diagnostics for one preset.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use lumen_apply::match_preset;

/// Arguments for `lumen check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Preset id to check the live config against.
    pub id: String,
}

#[derive(Tabled)]
struct MismatchRow {
    #[tabled(rename = "field")]
    field: String,
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "expected")]
    expected: String,
    #[tabled(rename = "actual")]
    actual: String,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let ctx = super::context()?;
        let preset = super::load_preset(&ctx, &self.id)?;
        let observed = ctx
            .store
            .read()
            .with_context(|| format!("failed to read {}", ctx.store.path().display()))?;

        let report = match_preset(&observed, &preset);
        if report.matches {
            println!("{} live config matches '{}'", "✓".green().bold(), self.id);
            return Ok(());
        }

        let rows: Vec<MismatchRow> = report
            .mismatches
            .into_iter()
            .map(|m| MismatchRow {
                field: m.field,
                key: m.key,
                expected: m.expected.unwrap_or_else(|| "(absent)".to_string()),
                actual: m.actual.unwrap_or_else(|| "(absent)".to_string()),
            })
            .collect();
        let count = rows.len();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        bail!("live config does not match '{}' ({count} mismatched keys)", self.id)
    }
}
