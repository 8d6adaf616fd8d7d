//! Core types for the auditor pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::evidence::Evidence;
use crate::CoreError;

/// The (question, candidate answer) pair submitted for auditing.
///
/// Equality and hashing cover both fields in full, so two inputs that differ
/// in a single byte are different runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TaskInput {
    /// The original question
    pub question: String,

    /// The candidate answer under audit
    pub answer: String,
}

impl TaskInput {
    /// Create a new task input.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Reject inputs the pipeline cannot audit.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.question.trim().is_empty() {
            return Err(CoreError::InvalidInput("question is empty".to_string()));
        }
        if self.answer.trim().is_empty() {
            return Err(CoreError::InvalidInput("answer is empty".to_string()));
        }
        Ok(())
    }
}

/// The two pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Critic,
    Reviser,
}

impl Stage {
    /// Stages in the only order they may run.
    pub const ORDER: [Stage; 2] = [Stage::Critic, Stage::Reviser];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Critic => "critic",
            Stage::Reviser => "reviser",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Label the critic assigns to a single claim in the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimLabel {
    /// Supported by the retrieved knowledge
    Accurate,

    /// Contradicted by the retrieved knowledge
    Inaccurate,

    /// Sources disagree
    Disputed,

    /// No support found either way
    Unsupported,

    /// Not a factual claim (opinion, instruction, greeting)
    NotApplicable,
}

impl ClaimLabel {
    /// Whether the reviser must act on a claim with this label.
    pub fn is_discrepancy(&self) -> bool {
        matches!(
            self,
            ClaimLabel::Inaccurate | ClaimLabel::Disputed | ClaimLabel::Unsupported
        )
    }

    /// Wire name, as written in critique JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimLabel::Accurate => "accurate",
            ClaimLabel::Inaccurate => "inaccurate",
            ClaimLabel::Disputed => "disputed",
            ClaimLabel::Unsupported => "unsupported",
            ClaimLabel::NotApplicable => "not_applicable",
        }
    }
}

impl fmt::Display for ClaimLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte range of a claim inside the candidate answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnswerSpan {
    pub start: usize,
    pub end: usize,
}

impl AnswerSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &AnswerSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Pointer notation used in logs and reports.
    pub fn pointer(&self) -> String {
        format!("answer[{}:{}]", self.start, self.end)
    }
}

/// The critic's assessment of one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimFinding {
    /// Claim text, quoted verbatim from the answer
    pub claim: String,

    pub label: ClaimLabel,

    /// Why the label was assigned
    pub justification: String,

    /// Replacement text for the claim, when the critic knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,

    /// Where the claim sits in the answer (None if not quoted verbatim)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<AnswerSpan>,

    /// Sources the critic cited for this claim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl ClaimFinding {
    pub fn is_discrepancy(&self) -> bool {
        self.label.is_discrepancy()
    }
}

/// Overall verdict derived from the findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// No discrepancies found
    Accurate,

    /// At least one claim is contradicted
    Inaccurate,

    /// Claims are disputed or unsupported, none contradicted
    Questionable,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accurate => "accurate",
            Verdict::Inaccurate => "inaccurate",
            Verdict::Questionable => "questionable",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the critic stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    /// Per-claim findings, in the order the critic reported them
    pub findings: Vec<ClaimFinding>,

    /// Facts retrieved while checking the answer
    #[serde(default)]
    pub evidence: Vec<Evidence>,

    /// One-paragraph assessment
    pub summary: String,

    /// True when the knowledge lookup was unavailable
    #[serde(default)]
    pub best_effort: bool,
}

impl Critique {
    /// A critique that explicitly reports no discrepancies.
    pub fn no_discrepancies(summary: impl Into<String>) -> Self {
        Self {
            findings: Vec::new(),
            evidence: Vec::new(),
            summary: summary.into(),
            best_effort: false,
        }
    }

    /// Findings the reviser must act on.
    pub fn discrepancies(&self) -> impl Iterator<Item = &ClaimFinding> {
        self.findings.iter().filter(|f| f.is_discrepancy())
    }

    pub fn has_discrepancies(&self) -> bool {
        self.discrepancies().next().is_some()
    }

    pub fn verdict(&self) -> Verdict {
        if self
            .findings
            .iter()
            .any(|f| f.label == ClaimLabel::Inaccurate)
        {
            Verdict::Inaccurate
        } else if self.has_discrepancies() {
            Verdict::Questionable
        } else {
            Verdict::Accurate
        }
    }
}

/// How the reviser produced its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionMethod {
    /// Critique was clean, answer returned untouched
    Identity,

    /// Rewritten by the model
    Model,

    /// Corrections spliced into the flagged spans
    SpanReplacement,
}

/// Output of the reviser stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisedOutput {
    /// The final answer
    pub answer: String,

    pub method: RevisionMethod,
}

impl RevisedOutput {
    /// Return the candidate answer as-is.
    pub fn unchanged(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            method: RevisionMethod::Identity,
        }
    }

    pub fn rewritten(answer: impl Into<String>, method: RevisionMethod) -> Self {
        Self {
            answer: answer.into(),
            method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(label: ClaimLabel) -> ClaimFinding {
        ClaimFinding {
            claim: "1990".to_string(),
            label,
            justification: "test".to_string(),
            correction: None,
            span: None,
            sources: vec![],
        }
    }

    #[test]
    fn test_task_input_validation() {
        assert!(TaskInput::new("Q?", "A").validate().is_ok());
        assert!(TaskInput::new("  ", "A").validate().is_err());
        assert!(TaskInput::new("Q?", "").validate().is_err());
    }

    #[test]
    fn test_label_discrepancy() {
        assert!(!ClaimLabel::Accurate.is_discrepancy());
        assert!(!ClaimLabel::NotApplicable.is_discrepancy());
        assert!(ClaimLabel::Inaccurate.is_discrepancy());
        assert!(ClaimLabel::Disputed.is_discrepancy());
        assert!(ClaimLabel::Unsupported.is_discrepancy());
    }

    #[test]
    fn test_verdict_derivation() {
        let mut critique = Critique::no_discrepancies("fine");
        assert_eq!(critique.verdict(), Verdict::Accurate);
        assert!(!critique.has_discrepancies());

        critique.findings.push(finding(ClaimLabel::Accurate));
        assert_eq!(critique.verdict(), Verdict::Accurate);

        critique.findings.push(finding(ClaimLabel::Unsupported));
        assert_eq!(critique.verdict(), Verdict::Questionable);

        critique.findings.push(finding(ClaimLabel::Inaccurate));
        assert_eq!(critique.verdict(), Verdict::Inaccurate);
        assert_eq!(critique.discrepancies().count(), 2);
    }

    #[test]
    fn test_span_overlap() {
        let a = AnswerSpan::new(0, 5);
        assert!(a.overlaps(&AnswerSpan::new(4, 8)));
        assert!(!a.overlaps(&AnswerSpan::new(5, 8)));
        assert_eq!(a.pointer(), "answer[0:5]");
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::ORDER, [Stage::Critic, Stage::Reviser]);
        assert!(Stage::Critic < Stage::Reviser);
        assert_eq!(Stage::Reviser.to_string(), "reviser");
    }

    #[test]
    fn test_label_serde_names() {
        let json = serde_json::to_string(&ClaimLabel::NotApplicable).unwrap();
        assert_eq!(json, "\"not_applicable\"");
        let label: ClaimLabel = serde_json::from_str("\"inaccurate\"").unwrap();
        assert_eq!(label, ClaimLabel::Inaccurate);
    }
}
