//! Auditor CLI
//!
//! Audit candidate answers against external knowledge, print the pipeline
//! definition, and deploy it to Vertex AI Agent Engine.

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod context;
mod output;

use cli::{Cli, Commands};
use context::Context;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("auditor_runtime={}", default_level).parse()?)
                .add_directive(format!("auditor_core={}", default_level).parse()?)
                .add_directive("warn".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::new(&cli)?;

    match cli.command {
        Commands::Audit(cmd) => commands::audit::execute(&ctx, cmd).await,
        Commands::Batch(cmd) => commands::batch::execute(&ctx, cmd).await,
        Commands::Definition(cmd) => commands::definition::execute(&ctx, cmd),
        Commands::Deploy(cmd) => commands::deploy::execute(&ctx, cmd).await,
    }
}
