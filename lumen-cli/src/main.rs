//! lumen: preset manager and supervisor for a game-streaming daemon.
//!
//! # Usage
//!
//! ```text
//! lumen preset list|show <id>|add <file> [--replace]|remove <id>
//! lumen apply <id> [--dry-run] [--no-restart] [--rollback]
//! lumen diff <id>
//! lumen check <id>
//! lumen status [--json]
//! lumen daemon start|stop|restart
//! lumen watch
//! lumen recover
//! lumen backup create|list|restore
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    apply::ApplyArgs, backup::BackupCommand, check::CheckArgs, daemon::DaemonCommand,
    diff::DiffArgs, preset::PresetCommand, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "lumen",
    version,
    about = "Apply streaming presets and keep the streaming daemon healthy",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the preset library.
    Preset {
        #[command(subcommand)]
        command: PresetCommand,
    },

    /// Write a preset into the daemon config and restart the daemon.
    Apply(ApplyArgs),

    /// Show a unified diff of what applying a preset would change.
    Diff(DiffArgs),

    /// Explain, field by field, whether the live config matches a preset.
    Check(CheckArgs),

    /// Show daemon status and the active preset.
    Status(StatusArgs),

    /// Start, stop or restart the streaming daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Run the status watchdog and config watcher in the foreground.
    Watch,

    /// Undo display changes left behind by a session that did not end cleanly.
    Recover,

    /// Manage daemon config backups.
    Backup {
        #[command(subcommand)]
        command: BackupCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Preset { command } => commands::preset::run(command),
        Commands::Apply(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Check(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
        Commands::Watch => commands::watch::run(),
        Commands::Recover => commands::recover::run(),
        Commands::Backup { command } => commands::backup::run(command),
    }
}
