//! AccessCMS CLI — accessibility-adapted travel and care content.
//!
//! Stores hotels, tours and care services and generates a rewrite of each
//! for five disability profiles, keeping every rewrite on the original schema.

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
