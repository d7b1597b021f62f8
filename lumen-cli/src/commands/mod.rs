pub mod apply;
pub mod backup;
pub mod check;
pub mod daemon;
pub mod diff;
pub mod preset;
pub mod recover;
pub mod status;
pub mod watch;

use std::future::Future;

use anyhow::{Context as _, Result};

use lumen_core::Context;

/// Load `~/.lumen/settings.yaml` into a [`Context`].
pub fn context() -> Result<Context> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Context::load_at(&home).context("failed to load ~/.lumen/settings.yaml")
}

/// Drive one async supervisor call to completion on a fresh runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    Ok(runtime.block_on(future))
}

pub fn load_preset(ctx: &Context, id: &str) -> Result<lumen_core::Preset> {
    lumen_core::presets::get_at(&ctx.home, &lumen_core::PresetId::from(id))
        .with_context(|| format!("failed to load preset '{id}'"))
}
