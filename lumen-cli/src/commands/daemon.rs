//! `lumen daemon start|stop|restart`: supervised lifecycle of the streaming daemon.

use anyhow::{Context, Result};
use clap::Subcommand;

use lumen_supervisor::{init_tracing, Supervisor};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Start the daemon and wait until it is running.
    Start,
    /// Stop the daemon. A running `lumen watch` will not restart it.
    Stop,
    /// Stop, let the OS release the daemon's ports, then start.
    Restart,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    init_tracing();
    let ctx = super::context()?;
    let supervisor = Supervisor::from_context(&ctx);

    match command {
        DaemonCommand::Start => {
            super::block_on(supervisor.start())?.context("failed to start daemon")?;
            println!("✓ daemon running");
        }
        DaemonCommand::Stop => {
            if super::block_on(supervisor.stop_by_user())?.context("failed to stop daemon")? {
                println!("✓ daemon stopped");
            } else {
                println!("daemon already stopped");
            }
        }
        DaemonCommand::Restart => {
            super::block_on(supervisor.restart())?.context("failed to restart daemon")?;
            println!("✓ daemon restarted");
        }
    }
    Ok(())
}
