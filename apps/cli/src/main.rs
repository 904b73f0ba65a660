//! ttharvest CLI — incremental harvester for WTT event and match data.
//!
//! Plans the minimal set of stale work against the local raw store and
//! fetches it concurrently from the public API.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
