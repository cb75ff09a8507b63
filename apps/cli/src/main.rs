//! InsightFlow CLI: profile a CSV, compute KPIs, chart monthly revenue,
//! and write an executive summary.
//!
//! Also hosts the HTTP API (`insightflow serve`) and long-term memory tools.

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
