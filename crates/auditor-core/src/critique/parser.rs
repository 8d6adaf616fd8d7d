//! Critique parsing from critic model output.
//!
//! Models wrap JSON in prose or fenced blocks; the parser extracts the
//! object, validates it against the schema and resolves every claim to a
//! span in the candidate answer. Anything that fails validation is an
//! error. There is no best-effort parse.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::schema::validate_critique_schema;
use crate::types::{AnswerSpan, ClaimFinding, ClaimLabel, Critique, TaskInput};

lazy_static! {
    /// A fenced code block, optionally tagged json.
    static ref FENCED_BLOCK: Regex = Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").unwrap();
}

/// Errors that can occur when parsing critic output.
#[derive(Error, Debug)]
pub enum CritiqueError {
    #[error("Critic output contains no JSON object")]
    NoJson,

    #[error("Failed to parse critic JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Critic output failed schema validation: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawCritique {
    findings: Vec<RawFinding>,
    summary: String,
}

#[derive(Debug, Deserialize)]
struct RawFinding {
    claim: String,
    label: ClaimLabel,
    justification: String,
    #[serde(default)]
    correction: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
}

/// Pull the JSON object out of a model response.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(caps) = FENCED_BLOCK.captures(text) {
        let inner = caps.get(1)?.as_str().trim();
        if inner.starts_with('{') {
            return Some(inner);
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse critic output into a [`Critique`] for the given input.
///
/// Evidence is left empty; the critic attaches what it retrieved.
pub fn parse_critique(text: &str, input: &TaskInput) -> Result<Critique, CritiqueError> {
    let json_text = extract_json(text).ok_or(CritiqueError::NoJson)?;
    let value: serde_json::Value = serde_json::from_str(json_text)?;
    validate_critique_schema(&value).map_err(CritiqueError::SchemaViolation)?;

    let raw: RawCritique = serde_json::from_value(value)?;

    let mut taken: Vec<AnswerSpan> = Vec::new();
    let findings = raw
        .findings
        .into_iter()
        .map(|f| {
            let claim = f.claim.trim().to_string();
            let span = locate_claim(&input.answer, &claim, &taken);
            match span {
                Some(span) => taken.push(span),
                None => debug!(claim = %claim, "Claim not found verbatim in answer"),
            }

            ClaimFinding {
                correction: normalize_correction(f.correction, &claim),
                claim,
                label: f.label,
                justification: f.justification.trim().to_string(),
                span,
                sources: f.sources,
            }
        })
        .collect();

    Ok(Critique {
        findings,
        evidence: Vec::new(),
        summary: raw.summary.trim().to_string(),
        best_effort: false,
    })
}

/// Find the first occurrence of `claim` that does not overlap a span
/// already assigned to an earlier finding.
fn locate_claim(answer: &str, claim: &str, taken: &[AnswerSpan]) -> Option<AnswerSpan> {
    if claim.is_empty() {
        return None;
    }

    answer
        .match_indices(claim)
        .map(|(start, m)| AnswerSpan::new(start, start + m.len()))
        .find(|span| !taken.iter().any(|t| t.overlaps(span)))
}

/// A correction that is blank or repeats the claim corrects nothing.
fn normalize_correction(correction: Option<String>, claim: &str) -> Option<String> {
    correction
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && c != claim)
}
