//! driverpub entry point.

mod app;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::app::Args;

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,driverpub=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), ?args, "starting driverpub");

    let rt = tokio::runtime::Runtime::new()?;
    let ok = rt.block_on(app::run(args))?;

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
