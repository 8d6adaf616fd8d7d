//! Audit many independent tasks

use anyhow::{bail, Context as _, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use auditor_core::TaskInput;
use auditor_runtime::AuditReport;

use crate::context::Context;
use crate::output::{render, report_text, OutputFormat};

#[derive(Args, Debug)]
pub struct BatchCommand {
    /// YAML or JSON file with a list of {question, answer} tasks
    #[arg(short, long)]
    pub input: PathBuf,

    /// Override the concurrency limit from config
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// Either a bare list or a `tasks:` mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TaskFile {
    Wrapped { tasks: Vec<TaskInput> },
    Bare(Vec<TaskInput>),
}

impl TaskFile {
    fn into_tasks(self) -> Vec<TaskInput> {
        match self {
            TaskFile::Wrapped { tasks } | TaskFile::Bare(tasks) => tasks,
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchEntry {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<AuditReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn parse_tasks(content: &str) -> Result<Vec<TaskInput>> {
    let file: TaskFile = serde_yaml::from_str(content)?;
    Ok(file.into_tasks())
}

pub async fn execute(ctx: &Context, cmd: BatchCommand) -> Result<()> {
    let content = std::fs::read_to_string(&cmd.input)
        .with_context(|| format!("reading tasks from {}", cmd.input.display()))?;
    let tasks = parse_tasks(&content)?;
    let total = tasks.len();

    let pipeline = match cmd.concurrency {
        Some(limit) => {
            let mut config = ctx.config.clone();
            config.max_concurrent_runs = limit;
            Context {
                config,
                definition: ctx.definition.clone(),
                format: ctx.format,
            }
            .pipeline()?
        }
        None => ctx.pipeline()?,
    };

    let entries: Vec<BatchEntry> = pipeline
        .run_batch(tasks)
        .await
        .into_iter()
        .enumerate()
        .map(|(index, result)| match result {
            Ok(report) => BatchEntry {
                index,
                report: Some(report),
                error: None,
            },
            Err(e) => BatchEntry {
                index,
                report: None,
                error: Some(e.to_string()),
            },
        })
        .collect();
    let failed = entries.iter().filter(|e| e.error.is_some()).count();

    match ctx.format {
        OutputFormat::Text => {
            for entry in &entries {
                println!("=== Task {} ===", entry.index + 1);
                match (&entry.report, &entry.error) {
                    (Some(report), _) => print!("{}", report_text(report)),
                    (None, Some(error)) => println!("Failed: {}", error),
                    (None, None) => {}
                }
                println!();
            }
        }
        format => println!("{}", render(&entries, format)?),
    }

    if failed > 0 {
        bail!("{} of {} tasks failed", failed, total);
    }
    Ok(())
}
