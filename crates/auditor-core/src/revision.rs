//! Revision rules: what a reviser may and must change.
//!
//! Two laws hold for every run:
//! 1. A critique with no discrepancies leaves the answer byte-for-byte intact
//! 2. A critique with discrepancies changes the answer in every flagged claim
//!
//! [`verify_revision`] checks a proposed revision against both laws.
//! [`apply_corrections`] builds a revision directly from critic corrections.

use thiserror::Error;

use crate::types::{AnswerSpan, Critique};

/// A revision that breaks the verify-then-revise contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RevisionError {
    #[error("Revised answer is empty")]
    Empty,

    #[error("Critique reports no discrepancies but the answer was edited")]
    UnrequestedEdit,

    #[error("Revised answer is identical to the candidate despite {0} flagged claim(s)")]
    Unchanged(usize),

    #[error("Flagged claim '{claim}' was not addressed")]
    Unaddressed { claim: String },

    #[error("Flagged claim '{claim}' has no correction to apply")]
    MissingCorrection { claim: String },

    #[error("Flagged claim '{claim}' could not be located in the answer")]
    SpanNotFound { claim: String },

    #[error("Flagged claims overlap at {0}")]
    OverlappingSpans(String),
}

/// Check a proposed revision against the critique it answers.
pub fn verify_revision(
    answer: &str,
    critique: &Critique,
    revised: &str,
) -> Result<(), RevisionError> {
    if revised.trim().is_empty() {
        return Err(RevisionError::Empty);
    }

    if !critique.has_discrepancies() {
        return if revised == answer {
            Ok(())
        } else {
            Err(RevisionError::UnrequestedEdit)
        };
    }

    if revised == answer {
        return Err(RevisionError::Unchanged(critique.discrepancies().count()));
    }

    for finding in critique.discrepancies() {
        let corrected = finding
            .correction
            .as_deref()
            .map(|c| revised.contains(c))
            .unwrap_or(false);
        let removed = revised.matches(finding.claim.as_str()).count()
            < answer.matches(finding.claim.as_str()).count();

        let addressed = if corrected || removed {
            true
        } else if finding.correction.is_some() {
            false
        } else {
            // Without a correction the reviser may keep the claim and qualify
            // it, but the edit has to reach the claim itself.
            finding
                .span
                .filter(|s| answer.get(s.start..s.end).is_some())
                .map_or(true, |span| span_touched(answer, revised, span))
        };

        if !addressed {
            return Err(RevisionError::Unaddressed {
                claim: finding.claim.clone(),
            });
        }
    }

    Ok(())
}

/// Bytes of context kept on each side of a flagged span.
const SPAN_CONTEXT: usize = 16;

/// Whether the edit from `answer` to `revised` reaches `span`.
///
/// The edited region of `answer` lies between the common prefix and the
/// common suffix of both strings. An edit adjacent to the span counts.
/// The span together with its surrounding context must also no longer
/// occur in `revised` as often as it does in `answer`.
fn span_touched(answer: &str, revised: &str, span: AnswerSpan) -> bool {
    let prefix: usize = answer
        .chars()
        .zip(revised.chars())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum();
    let suffix: usize = answer
        .chars()
        .rev()
        .zip(revised.chars().rev())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum();
    let suffix = suffix
        .min(answer.len() - prefix)
        .min(revised.len() - prefix);
    let edit_end = answer.len() - suffix;

    if edit_end < span.start || prefix > span.end {
        return false;
    }

    let window = &answer[context_start(answer, span.start)..context_end(answer, span.end)];
    revised.matches(window).count() < answer.matches(window).count()
}

fn context_start(text: &str, start: usize) -> usize {
    let mut at = start.saturating_sub(SPAN_CONTEXT);
    while !text.is_char_boundary(at) {
        at += 1;
    }
    at
}

fn context_end(text: &str, end: usize) -> usize {
    let mut at = (end + SPAN_CONTEXT).min(text.len());
    while !text.is_char_boundary(at) {
        at -= 1;
    }
    at
}

/// Splice every correction into its flagged span.
///
/// Fails unless every discrepancy has both a resolved span and a
/// correction. A clean critique returns the answer unchanged.
pub fn apply_corrections(answer: &str, critique: &Critique) -> Result<String, RevisionError> {
    let mut edits: Vec<(AnswerSpan, &str)> = Vec::new();

    for finding in critique.discrepancies() {
        let span = finding
            .span
            .filter(|s| answer.get(s.start..s.end).is_some())
            .ok_or_else(|| RevisionError::SpanNotFound {
                claim: finding.claim.clone(),
            })?;
        let correction =
            finding
                .correction
                .as_deref()
                .ok_or_else(|| RevisionError::MissingCorrection {
                    claim: finding.claim.clone(),
                })?;
        edits.push((span, correction));
    }

    // Apply right to left so earlier offsets stay valid.
    edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    for pair in edits.windows(2) {
        if pair[0].0.overlaps(&pair[1].0) {
            return Err(RevisionError::OverlappingSpans(pair[0].0.pointer()));
        }
    }

    let mut revised = answer.to_string();
    for (span, correction) in edits {
        revised.replace_range(span.start..span.end, correction);
    }
    Ok(revised)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClaimFinding, ClaimLabel};
    use proptest::prelude::*;

    fn finding(
        claim: &str,
        label: ClaimLabel,
        correction: Option<&str>,
        span: Option<AnswerSpan>,
    ) -> ClaimFinding {
        ClaimFinding {
            claim: claim.to_string(),
            label,
            justification: "test".to_string(),
            correction: correction.map(str::to_string),
            span,
            sources: vec![],
        }
    }

    fn critique_with(findings: Vec<ClaimFinding>) -> Critique {
        Critique {
            findings,
            evidence: vec![],
            summary: "test".to_string(),
            best_effort: false,
        }
    }

    #[test]
    fn test_clean_critique_requires_identity() {
        let critique = Critique::no_discrepancies("fine");
        assert!(verify_revision("100°C", &critique, "100°C").is_ok());
        assert_eq!(
            verify_revision("100°C", &critique, "100 °C"),
            Err(RevisionError::UnrequestedEdit)
        );
    }

    #[test]
    fn test_unchanged_revision_rejected() {
        let critique = critique_with(vec![finding(
            "1990",
            ClaimLabel::Inaccurate,
            Some("1989"),
            Some(AnswerSpan::new(0, 4)),
        )]);
        assert_eq!(
            verify_revision("1990", &critique, "1990"),
            Err(RevisionError::Unchanged(1))
        );
    }

    #[test]
    fn test_correction_present_is_addressed() {
        let critique = critique_with(vec![finding(
            "1990",
            ClaimLabel::Inaccurate,
            Some("1989"),
            Some(AnswerSpan::new(0, 4)),
        )]);
        assert!(verify_revision("1990", &critique, "1989").is_ok());
        assert!(verify_revision("1990", &critique, "It fell in 1989, not 1990.").is_ok());
    }

    #[test]
    fn test_unaddressed_claim_rejected() {
        let critique = critique_with(vec![finding(
            "1990",
            ClaimLabel::Inaccurate,
            Some("1989"),
            Some(AnswerSpan::new(0, 4)),
        )]);
        let result = verify_revision("1990", &critique, "1990, roughly.");
        assert!(matches!(result, Err(RevisionError::Unaddressed { .. })));
    }

    #[test]
    fn test_disputed_without_correction_may_be_qualified() {
        let answer = "Pluto is a planet.";
        let critique = critique_with(vec![finding(
            "Pluto is a planet",
            ClaimLabel::Disputed,
            None,
            Some(AnswerSpan::new(0, 17)),
        )]);
        let revised = "Pluto is a planet by some definitions, but the IAU classes it as a dwarf planet.";
        assert!(verify_revision(answer, &critique, revised).is_ok());
    }

    #[test]
    fn test_edit_outside_flagged_claim_rejected() {
        let answer = "Water boils at 100°C. Einstein discovered it.";
        let start = answer.find("Einstein").unwrap();
        let critique = critique_with(vec![finding(
            "Einstein discovered it",
            ClaimLabel::Unsupported,
            None,
            Some(AnswerSpan::new(start, start + "Einstein discovered it".len())),
        )]);

        assert!(matches!(
            verify_revision(answer, &critique, "Water boils at 90°C. Einstein discovered it."),
            Err(RevisionError::Unaddressed { .. })
        ));
        assert!(verify_revision(
            answer,
            &critique,
            "Water boils at 100°C. It is unclear who first measured it."
        )
        .is_ok());
    }

    #[test]
    fn test_repeated_edits_around_untouched_claim_rejected() {
        let answer = "In 1961 the wall was built by the Soviets in Berlin overnight.";
        let start = answer.find("by the Soviets").unwrap();
        let critique = critique_with(vec![finding(
            "by the Soviets",
            ClaimLabel::Unsupported,
            None,
            Some(AnswerSpan::new(start, start + "by the Soviets".len())),
        )]);

        let revised = "In August 1961 the wall was built by the Soviets in Berlin overnight!";
        assert!(matches!(
            verify_revision(answer, &critique, revised),
            Err(RevisionError::Unaddressed { .. })
        ));
    }

    #[test]
    fn test_empty_revision_rejected() {
        let critique = Critique::no_discrepancies("fine");
        assert_eq!(verify_revision("a", &critique, "  "), Err(RevisionError::Empty));
    }

    #[test]
    fn test_apply_corrections_multiple_spans() {
        let answer = "The wall fell in 1990 in Bonn.";
        let critique = critique_with(vec![
            finding("1990", ClaimLabel::Inaccurate, Some("1989"), Some(AnswerSpan::new(17, 21))),
            finding("Bonn", ClaimLabel::Inaccurate, Some("Berlin"), Some(AnswerSpan::new(25, 29))),
        ]);
        let revised = apply_corrections(answer, &critique).unwrap();
        assert_eq!(revised, "The wall fell in 1989 in Berlin.");
        assert!(verify_revision(answer, &critique, &revised).is_ok());
    }

    #[test]
    fn test_apply_corrections_requires_correction() {
        let critique = critique_with(vec![finding(
            "1990",
            ClaimLabel::Unsupported,
            None,
            Some(AnswerSpan::new(0, 4)),
        )]);
        assert!(matches!(
            apply_corrections("1990", &critique),
            Err(RevisionError::MissingCorrection { .. })
        ));
    }

    #[test]
    fn test_apply_corrections_requires_span() {
        let critique = critique_with(vec![finding("1991", ClaimLabel::Inaccurate, Some("1989"), None)]);
        assert!(matches!(
            apply_corrections("1990", &critique),
            Err(RevisionError::SpanNotFound { .. })
        ));
    }

    #[test]
    fn test_apply_corrections_rejects_overlap() {
        let critique = critique_with(vec![
            finding("wall fell", ClaimLabel::Inaccurate, Some("x"), Some(AnswerSpan::new(4, 13))),
            finding("fell in", ClaimLabel::Inaccurate, Some("y"), Some(AnswerSpan::new(9, 16))),
        ]);
        assert!(matches!(
            apply_corrections("The wall fell in 1990", &critique),
            Err(RevisionError::OverlappingSpans(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_identity_law(answer in "\\PC{1,80}", claims in proptest::collection::vec("[a-z]{1,8}", 0..4)) {
            prop_assume!(!answer.trim().is_empty());
            let findings = claims
                .iter()
                .map(|c| finding(c, ClaimLabel::Accurate, None, None))
                .collect();
            let critique = critique_with(findings);

            let revised = apply_corrections(&answer, &critique).unwrap();
            prop_assert_eq!(&revised, &answer);
            prop_assert!(verify_revision(&answer, &critique, &revised).is_ok());
        }

        #[test]
        fn prop_discrepancy_law(
            prefix in "[a-z ]{0,20}",
            claim in "[0-9]{4}",
            suffix in "[a-z .]{0,20}",
            correction in "[A-Z]{1,6}",
        ) {
            let answer = format!("{}{}{}", prefix, claim, suffix);
            let start = prefix.len();
            let critique = critique_with(vec![finding(
                &claim,
                ClaimLabel::Inaccurate,
                Some(&correction),
                Some(AnswerSpan::new(start, start + claim.len())),
            )]);

            let revised = apply_corrections(&answer, &critique).unwrap();
            prop_assert_ne!(&revised, &answer);
            prop_assert_eq!(&revised[start..start + correction.len()], correction.as_str());
            prop_assert!(verify_revision(&answer, &critique, &revised).is_ok());
        }

        #[test]
        fn prop_edit_away_from_uncorrected_claim_rejected(
            prefix in "[a-z ]{1,20}",
            claim in "[0-9]{4}",
            suffix in "[a-z .]{0,20}",
            inserted in "[A-Z]{1,6}",
        ) {
            let answer = format!("{}{}{}", prefix, claim, suffix);
            let start = prefix.len();
            let critique = critique_with(vec![finding(
                &claim,
                ClaimLabel::Unsupported,
                None,
                Some(AnswerSpan::new(start, start + claim.len())),
            )]);

            let revised = format!("{}{}", inserted, answer);
            prop_assert!(
                matches!(
                    verify_revision(&answer, &critique, &revised),
                    Err(RevisionError::Unaddressed { .. })
                ),
                "edit before the claim was accepted"
            );
        }
    }
}
