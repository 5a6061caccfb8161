//! Enricher CLI: refreshes per-package metadata for a plugin catalog.
//!
//! Pulls release, popularity, and presentation data from the package
//! registry and the source-hosting service, then rebuilds the aggregated
//! summary consumed downstream.

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
