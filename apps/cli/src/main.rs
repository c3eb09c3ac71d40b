//! ctxgen CLI — compile AI context documents from declarative configs.
//!
//! Resolves a config and its imports, fetches every declared source, and
//! writes one Markdown file per document.

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
