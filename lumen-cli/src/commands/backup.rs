//! `lumen backup create|list|restore`

use anyhow::{Context, Result};
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// Copy the live daemon config aside.
    Create,
    /// List backups, newest first.
    List,
    /// Copy the newest backup over the live config.
    Restore,
}

pub fn run(command: BackupCommand) -> Result<()> {
    let ctx = super::context()?;
    let store = &ctx.store;
    match command {
        BackupCommand::Create => {
            let path = store.backup().context("backup failed")?;
            println!("✓ Backed up to {}", path.display());
        }
        BackupCommand::List => {
            let backups = store.list_backups().context("failed to list backups")?;
            if backups.is_empty() {
                println!("No backups of {}.", store.path().display());
            }
            for path in backups {
                println!("{}", path.display());
            }
        }
        BackupCommand::Restore => {
            let path = store.restore_latest().context("restore failed")?;
            println!("✓ Restored {} from {}", store.path().display(), path.display());
        }
    }
    Ok(())
}
