//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{
    audit::AuditCommand, batch::BatchCommand, definition::DefinitionCommand,
    deploy::DeployCommand,
};
use crate::output::OutputFormat;

/// LLM answer auditor
///
/// Checks every claim in a candidate answer against external knowledge and
/// rewrites the answer so each discrepancy is resolved.
#[derive(Parser, Debug)]
#[command(name = "auditor")]
#[command(version)]
#[command(about = "Critic-then-reviser auditing of LLM answers", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Runtime configuration file (YAML, or JSON by extension)
    #[arg(short, long, global = true, env = "AUDITOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// LLM provider registry key (gemini, anthropic)
    #[arg(long, global = true, env = "AUDITOR_PROVIDER")]
    pub provider: Option<String>,

    /// Model for both stages
    #[arg(long, global = true, env = "AUDITOR_MODEL")]
    pub model: Option<String>,

    /// Fact table to use instead of web search
    #[arg(long, global = true)]
    pub facts: Option<PathBuf>,

    /// Pipeline definition file (defaults to the stock llm_auditor)
    #[arg(long, global = true)]
    pub definition: Option<PathBuf>,

    /// Output format (text, json, yaml)
    #[arg(short, long, global = true, default_value = "text", env = "AUDITOR_OUTPUT")]
    pub format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Audit one question and candidate answer
    Audit(AuditCommand),

    /// Audit many independent tasks from a file
    Batch(BatchCommand),

    /// Print the pipeline definition
    #[command(alias = "def")]
    Definition(DefinitionCommand),

    /// Deploy the pipeline to Vertex AI Agent Engine
    Deploy(DeployCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_audit_with_globals() {
        let cli = Cli::try_parse_from([
            "auditor",
            "--provider",
            "anthropic",
            "audit",
            "--question",
            "Who built the Berlin Wall?",
            "--answer",
            "The United States.",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.provider.as_deref(), Some("anthropic"));
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Audit(cmd) => assert_eq!(cmd.answer, "The United States."),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_deploy_dry_run_flag() {
        let cli = Cli::try_parse_from(["auditor", "deploy", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Deploy(cmd) => assert!(cmd.dry_run),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
