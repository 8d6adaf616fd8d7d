//! # auditor-core
//!
//! Deterministic core of the LLM auditor pipeline.
//!
//! The auditor runs two stages over every input, in fixed order:
//! 1. **Critic**: checks each claim in a candidate answer against external knowledge
//! 2. **Reviser**: rewrites the answer so every flagged claim is resolved
//!
//! This crate holds everything about that contract that does not need a
//! model or a network: the data model, critique parsing, revision rules,
//! the pipeline definition and the run typestate.
//!
//! ## Key Guarantees
//!
//! 1. **Ordered**: a revision can only be recorded on a critiqued run
//! 2. **Identity**: a clean critique leaves the answer untouched
//! 3. **Addressed**: every flagged claim changes in the revised answer
//! 4. **No I/O**: parsing and verification are pure functions
//!
//! ## Example
//!
//! ```rust
//! use auditor_core::{AuditRun, Critique, RevisedOutput, TaskInput};
//!
//! let run = AuditRun::new(TaskInput::new(
//!     "What is the boiling point of water at sea level?",
//!     "100°C",
//! ));
//! let run = run.record_critique(Critique::no_discrepancies("Correct."));
//! let outcome = run.complete(RevisedOutput::unchanged("100°C")).unwrap();
//! assert_eq!(outcome.revised.answer, "100°C");
//! ```

pub mod critique;
pub mod evidence;
pub mod pipeline;
pub mod revision;
pub mod run;
pub mod types;

// Re-export main types at crate root
pub use critique::{parse_critique, CritiqueError};
pub use evidence::{Evidence, EvidenceBuilder, EvidenceSource};
pub use pipeline::{DefinitionError, PipelineDefinition, StageSpec};
pub use revision::{apply_corrections, verify_revision, RevisionError};
pub use run::{AuditOutcome, AuditRun, Critiqued, Pending};
pub use types::{
    AnswerSpan, ClaimFinding, ClaimLabel, Critique, RevisedOutput, RevisionMethod, Stage,
    TaskInput, Verdict,
};

use thiserror::Error;

/// Errors that can occur in the deterministic core.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid task input: {0}")]
    InvalidInput(String),

    #[error("Critique error: {0}")]
    Critique(#[from] CritiqueError),

    #[error("Revision error: {0}")]
    Revision(#[from] RevisionError),
}

/// Run the reviser half of the contract without a model.
///
/// Splices critic corrections into the answer and completes the run. Used
/// when every discrepancy carries a correction, and as the reference
/// behavior model-backed revisers are checked against.
pub fn revise_with_corrections(run: AuditRun<Critiqued>) -> Result<AuditOutcome, CoreError> {
    let revised = if run.critique().has_discrepancies() {
        let answer = apply_corrections(&run.input().answer, run.critique())?;
        RevisedOutput::rewritten(answer, RevisionMethod::SpanReplacement)
    } else {
        RevisedOutput::unchanged(run.input().answer.clone())
    };
    Ok(run.complete(revised)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_berlin_wall_scenario() {
        let input = TaskInput::new("What year did the Berlin Wall fall?", "1990");
        let critic_output = r#"{
            "findings": [
                {"claim": "1990", "label": "inaccurate",
                 "justification": "The Berlin Wall fell on 9 November 1989.",
                 "correction": "1989"}
            ],
            "summary": "The year is wrong."
        }"#;

        let critique = parse_critique(critic_output, &input).unwrap();
        assert_eq!(critique.verdict(), Verdict::Inaccurate);

        let outcome = revise_with_corrections(AuditRun::new(input).record_critique(critique)).unwrap();
        assert_eq!(outcome.revised.answer, "1989");
        assert!(outcome.changed());
    }

    #[test]
    fn test_boiling_point_scenario() {
        let input = TaskInput::new("What is the boiling point of water at sea level?", "100°C");
        let critic_output = r#"{
            "findings": [
                {"claim": "100°C", "label": "accurate",
                 "justification": "Water boils at 100°C at one atmosphere."}
            ],
            "summary": "The answer is correct."
        }"#;

        let critique = parse_critique(critic_output, &input).unwrap();
        assert!(!critique.has_discrepancies());

        let outcome = revise_with_corrections(AuditRun::new(input).record_critique(critique)).unwrap();
        assert_eq!(outcome.revised.answer, "100°C");
        assert_eq!(outcome.revised.method, RevisionMethod::Identity);
    }

    #[test]
    fn test_uncorrectable_discrepancy_fails() {
        let input = TaskInput::new("Q?", "Some claim.");
        let critique = parse_critique(
            r#"{"findings":[{"claim":"Some claim","label":"unsupported","justification":"none"}],"summary":"s"}"#,
            &input,
        )
        .unwrap();

        let result = revise_with_corrections(AuditRun::new(input).record_critique(critique));
        assert!(matches!(result, Err(CoreError::Revision(RevisionError::MissingCorrection { .. }))));
    }
}
