//! Output rendering

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use std::fmt::Write;

use auditor_runtime::AuditReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

/// Serialize `value` as JSON or YAML.
///
/// Text falls back to YAML; commands that have a text view render it
/// themselves.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml | OutputFormat::Text => serde_yaml::to_string(value)?,
    })
}

/// Human-readable summary of one run.
pub fn report_text(report: &AuditReport) -> String {
    let outcome = &report.outcome;
    let critique = &outcome.critique;
    let mut out = String::new();

    let _ = writeln!(out, "Question: {}", outcome.input.question);
    let _ = writeln!(out, "Answer:   {}", outcome.input.answer);
    let _ = writeln!(
        out,
        "Verdict:  {}{}{}",
        report.verdict,
        if critique.best_effort { " (best effort, lookup unavailable)" } else { "" },
        if report.cached { " [cached]" } else { "" },
    );

    if !critique.findings.is_empty() {
        let _ = writeln!(out, "\nFindings:");
        for finding in &critique.findings {
            let _ = write!(out, "  - [{}] \"{}\": {}", finding.label, finding.claim, finding.justification);
            if let Some(correction) = &finding.correction {
                let _ = write!(out, " -> \"{}\"", correction);
            }
            let _ = writeln!(out);
        }
    }

    if !critique.evidence.is_empty() {
        let _ = writeln!(out, "\nEvidence:");
        for evidence in &critique.evidence {
            let _ = writeln!(out, "  - {} ({})", evidence.title, evidence.pointer);
        }
    }

    let _ = writeln!(out, "\nSummary: {}", critique.summary);
    let _ = writeln!(out, "\nRevised answer:\n{}", report.revised_answer());
    out
}
