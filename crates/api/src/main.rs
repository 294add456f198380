//! Tokenwarden - multi-platform OAuth token lifecycle coordinator
//!
//! Main entry point for the command-line application.

use clap::Parser;
use tokenwarden_app::utils::logging::init_tracing;
use tokenwarden_app::{execute, AppContext, Cli};
use tokenwarden_infra::config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = config::load(cli.config.clone())?;

    init_tracing(&settings.logging)?;
    tracing::info!(command = cli.command.name(), "tokenwarden starting");

    let ctx = AppContext::new(settings).await?;
    let mut stdout = std::io::stdout().lock();
    let result = execute(&ctx, &cli.command, &mut stdout).await;

    ctx.shutdown().await?;
    result
}
