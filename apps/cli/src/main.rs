//! SiteKiln CLI: static-site asset build pipeline.
//!
//! Compiles Sass, prunes and minifies CSS, assembles AMP pages with inlined
//! styles, serves the result with live reload, and validates it.

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
