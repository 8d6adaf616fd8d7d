//! Audit a single answer

use anyhow::Result;
use clap::Args;

use auditor_core::TaskInput;

use crate::context::Context;
use crate::output::{render, report_text, OutputFormat};

#[derive(Args, Debug)]
pub struct AuditCommand {
    /// The question the answer responds to
    #[arg(short, long)]
    pub question: String,

    /// The candidate answer to audit
    #[arg(short, long)]
    pub answer: String,
}

pub async fn execute(ctx: &Context, cmd: AuditCommand) -> Result<()> {
    let pipeline = ctx.pipeline()?;
    let report = pipeline.run(TaskInput::new(cmd.question, cmd.answer)).await?;

    match ctx.format {
        OutputFormat::Text => print!("{}", report_text(&report)),
        format => println!("{}", render(&report, format)?),
    }

    let usage = pipeline.usage();
    tracing::debug!(
        llm_calls = usage.llm_calls,
        total_tokens = usage.total_tokens,
        estimated_cost = usage.estimated_cost,
        "Model usage"
    );
    Ok(())
}
