//! Deploy the pipeline to Vertex AI Agent Engine

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

use auditor_runtime::deploy::{AgentEngineClient, DeployConfig, DeploymentSpec};
use auditor_runtime::Deployer;

use crate::context::Context;
use crate::output::{render, OutputFormat};

#[derive(Args, Debug)]
pub struct DeployCommand {
    /// Validate the environment and print what would be deployed
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct Plan<'a> {
    resource_name: String,
    config: &'a DeployConfig,
    spec: &'a DeploymentSpec,
}

pub async fn execute(ctx: &Context, cmd: DeployCommand) -> Result<()> {
    // Every identifier is checked before a client is built or a request sent.
    let config = DeployConfig::from_env()?;

    if cmd.dry_run {
        let spec = DeploymentSpec::new(ctx.definition.clone(), &config);
        let plan = Plan {
            resource_name: config.resource_name(),
            config: &config,
            spec: &spec,
        };
        let format = match ctx.format {
            OutputFormat::Text => OutputFormat::Yaml,
            other => other,
        };
        println!("{}", render(&plan, format)?);
        return Ok(());
    }

    let client = AgentEngineClient::from_env(config.location.clone())?;
    let deployer = Deployer::new(Arc::new(client), ctx.definition.clone());
    let receipt = deployer.run_from_env().await?;

    match ctx.format {
        OutputFormat::Text => {
            println!("Deployed {}", receipt.resource_name);
            if let Some(operation) = &receipt.operation {
                println!("Operation: {}", operation);
            }
        }
        format => println!("{}", render(&receipt, format)?),
    }
    Ok(())
}
