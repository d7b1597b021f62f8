//! `lumen preset list|show|add|remove`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use lumen_apply::snapshot;
use lumen_core::{presets, Preset, PresetId};

#[derive(Subcommand, Debug)]
pub enum PresetCommand {
    /// List presets in the library.
    List,

    /// Print one preset as YAML.
    Show {
        id: String,
    },

    /// Add a preset from a YAML or JSON file.
    Add(AddArgs),

    /// Remove a preset. Read-only presets cannot be removed.
    Remove {
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Preset file (YAML or JSON).
    pub file: PathBuf,

    /// Replace an existing preset with the same id.
    #[arg(long)]
    pub replace: bool,
}

#[derive(Tabled)]
struct PresetRow {
    #[tabled(rename = "")]
    active: String,
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "resolution")]
    resolution: String,
    #[tabled(rename = "fps")]
    fps: u32,
    #[tabled(rename = "bitrate")]
    bitrate: u32,
    #[tabled(rename = "read-only")]
    read_only: String,
}

pub fn run(command: PresetCommand) -> Result<()> {
    let ctx = super::context()?;
    match command {
        PresetCommand::List => {
            let library = ctx.presets().context("failed to load preset library")?;
            let active = snapshot::read_active(&ctx.export_dir())
                .ok()
                .flatten();
            let rows: Vec<PresetRow> = library
                .presets
                .iter()
                .map(|p| PresetRow {
                    active: if active.as_ref() == Some(&p.id) {
                        "●".green().bold().to_string()
                    } else {
                        String::new()
                    },
                    id: p.id.to_string(),
                    name: p.name.clone(),
                    resolution: resolution_label(p),
                    fps: p.display.fps,
                    bitrate: p.display.bitrate,
                    read_only: if p.is_read_only { "yes" } else { "" }.to_string(),
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        PresetCommand::Show { id } => {
            let preset = super::load_preset(&ctx, &id)?;
            print!("{}", serde_yaml::to_string(&preset)?);
        }
        PresetCommand::Add(args) => {
            let text = std::fs::read_to_string(&args.file)
                .with_context(|| format!("failed to read {}", args.file.display()))?;
            let mut preset: Preset = serde_yaml::from_str(&text)
                .with_context(|| format!("{} is not a valid preset", args.file.display()))?;
            // Only the built-in default is read-only.
            preset.is_read_only = false;
            let id = preset.id.clone();
            if args.replace {
                presets::upsert_at(&ctx.home, preset)
            } else {
                presets::add_at(&ctx.home, preset)
            }
            .with_context(|| format!("failed to add preset '{id}'"))?;
            println!("✓ Added preset '{id}'");
        }
        PresetCommand::Remove { id } => {
            let removed = presets::delete_at(&ctx.home, &PresetId::from(id.as_str()))
                .with_context(|| format!("failed to remove preset '{id}'"))?;
            println!("✓ Removed preset '{}' ({})", removed.id, removed.name);
        }
    }
    Ok(())
}

fn resolution_label(preset: &Preset) -> String {
    use lumen_core::ResolutionStrategy;

    match (preset.display.strategy, preset.display.manual_resolution) {
        (ResolutionStrategy::FollowClient, _) | (_, None) => "client".to_string(),
        (_, Some(res)) => match &preset.display.manual_refresh_rate {
            Some(hz) => format!("{res}@{hz}"),
            None => res.to_string(),
        },
    }
}
