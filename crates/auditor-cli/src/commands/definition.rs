//! Print the pipeline definition

use anyhow::Result;
use clap::Args;

use crate::context::Context;
use crate::output::{render, OutputFormat};

#[derive(Args, Debug)]
pub struct DefinitionCommand {
    /// Validate the definition and exit without printing it
    #[arg(long)]
    pub check: bool,
}

pub fn execute(ctx: &Context, cmd: DefinitionCommand) -> Result<()> {
    ctx.definition.validate()?;
    if cmd.check {
        println!("Pipeline definition '{}' is valid", ctx.definition.name);
        return Ok(());
    }

    match ctx.format {
        OutputFormat::Text => print!("{}", ctx.definition.to_yaml()?),
        format => println!("{}", render(&ctx.definition, format)?),
    }
    Ok(())
}
