//! xdbg entry point.

mod app;
mod config;
mod input;
mod render;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they do not interleave with session output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,xdbg=debug")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting xdbg");

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = config::Config::load(path)?;
    tracing::info!(
        addr = %config.debugger.bind_addr(),
        idekey = %config.debugger.idekey,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("xdbg shut down cleanly");
    Ok(())
}
