//! Run typestate: critique first, revision second, once each.
//!
//! An [`AuditRun`] moves through `Pending -> Critiqued -> AuditOutcome` by
//! value. The reviser's input is only reachable from `AuditRun<Critiqued>`,
//! so a revision without a critique for the same input does not compile,
//! and a consumed run cannot be critiqued twice.

use serde::{Deserialize, Serialize};

use crate::revision::{verify_revision, RevisionError};
use crate::types::{Critique, RevisedOutput, TaskInput};

/// Run awaiting its critique.
#[derive(Debug)]
pub struct Pending;

/// Run whose critique has been recorded.
#[derive(Debug)]
pub struct Critiqued {
    critique: Critique,
}

/// One pipeline run over a single task input.
#[derive(Debug)]
pub struct AuditRun<S> {
    input: TaskInput,
    state: S,
}

impl AuditRun<Pending> {
    pub fn new(input: TaskInput) -> Self {
        Self {
            input,
            state: Pending,
        }
    }

    pub fn input(&self) -> &TaskInput {
        &self.input
    }

    /// Record the critic's output for this run.
    pub fn record_critique(self, critique: Critique) -> AuditRun<Critiqued> {
        AuditRun {
            input: self.input,
            state: Critiqued { critique },
        }
    }
}

impl AuditRun<Critiqued> {
    pub fn input(&self) -> &TaskInput {
        &self.input
    }

    pub fn critique(&self) -> &Critique {
        &self.state.critique
    }

    /// Record the reviser's output, checking it against the critique.
    pub fn complete(self, revised: RevisedOutput) -> Result<AuditOutcome, RevisionError> {
        verify_revision(&self.input.answer, &self.state.critique, &revised.answer)?;
        Ok(AuditOutcome {
            input: self.input,
            critique: self.state.critique,
            revised,
        })
    }
}

/// A finished run: exactly one critique and one revised output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditOutcome {
    pub input: TaskInput,
    pub critique: Critique,
    pub revised: RevisedOutput,
}

impl AuditOutcome {
    /// Whether the final answer differs from the candidate.
    pub fn changed(&self) -> bool {
        self.revised.answer != self.input.answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnswerSpan, ClaimFinding, ClaimLabel, RevisionMethod};

    #[test]
    fn test_clean_run_completes_with_identity() {
        let run = AuditRun::new(TaskInput::new(
            "What is the boiling point of water at sea level?",
            "100°C",
        ));
        let run = run.record_critique(Critique::no_discrepancies("Correct."));
        let answer = run.input().answer.clone();

        let outcome = run.complete(RevisedOutput::unchanged(answer)).unwrap();
        assert!(!outcome.changed());
        assert_eq!(outcome.revised.method, RevisionMethod::Identity);
    }

    #[test]
    fn test_bad_revision_fails_run() {
        let run = AuditRun::new(TaskInput::new("Q?", "1990")).record_critique(Critique {
            findings: vec![ClaimFinding {
                claim: "1990".to_string(),
                label: ClaimLabel::Inaccurate,
                justification: "1989".to_string(),
                correction: Some("1989".to_string()),
                span: Some(AnswerSpan::new(0, 4)),
                sources: vec![],
            }],
            evidence: vec![],
            summary: "wrong".to_string(),
            best_effort: false,
        });

        let result = run.complete(RevisedOutput::unchanged("1990"));
        assert!(matches!(result, Err(RevisionError::Unchanged(1))));
    }
}
