//! System prompts for the critic and reviser agents.
//!
//! Static instructions live in the system message; the task input, lookup
//! results and critique are rendered into the user message by the
//! `*_user_message` helpers so the system prompt stays byte-stable.

use auditor_core::{Critique, TaskInput};

use crate::knowledge::SearchHit;

/// Critic system prompt.
///
/// The critic verifies; it does not rewrite. Output must match the critique
/// JSON schema exactly.
pub const CRITIC_PROMPT: &str = r#"
You are a professional fact-checking critic.

You receive a question and a candidate answer written by another AI model,
plus search results retrieved for the question. Your job is to identify every
factual claim in the candidate answer and verify it.

## Procedure
1. Split the answer into atomic claims. Quote each claim EXACTLY as it appears
   in the answer, so it can be located verbatim.
2. For each claim, decide one label:
   - "accurate": supported by reliable evidence
   - "inaccurate": contradicted by reliable evidence
   - "disputed": reliable sources disagree
   - "unsupported": no reliable evidence either way
   - "not_applicable": opinion, instruction, or not a factual claim
3. Justify every label in one or two sentences, citing evidence.
4. For "inaccurate" claims, give the corrected text in "correction". The
   correction must be a drop-in replacement for the quoted claim.
5. List the URLs you relied on in "sources".

Base your verdicts on the search results when they are provided. If no search
results are provided, rely on well-established knowledge only and prefer
"unsupported" over guessing.

## Output Format (JSON only, no prose)
{
  "findings": [
    {
      "claim": "exact quote from the answer",
      "label": "accurate" | "inaccurate" | "disputed" | "unsupported" | "not_applicable",
      "justification": "why",
      "correction": "replacement text or null",
      "sources": ["https://..."]
    }
  ],
  "summary": "one paragraph overall assessment"
}
"#;

/// Reviser system prompt.
pub const REVISER_PROMPT: &str = r#"
You are a careful editor revising an answer written by another AI model.

You receive the original question, the candidate answer, and a critique that
labels each claim in the answer. Produce a revised answer.

## Rules
1. Keep every "accurate" and "not_applicable" claim verbatim.
2. Replace every "inaccurate" claim with its correction.
3. Rewrite every "disputed" claim to present the competing positions.
4. Soften or remove every "unsupported" claim.
5. Preserve the original structure, tone and length as far as possible.
6. Do not introduce new facts that the critique does not support.

## Output
Return ONLY the revised answer text. No preamble, no explanation, no
markdown fences.
"#;

/// User message for the critic.
pub fn critic_user_message(input: &TaskInput, results: &[SearchHit]) -> String {
    let mut message = format!(
        "## Question\n{}\n\n## Candidate answer\n{}\n\n## Search results\n",
        input.question, input.answer
    );

    if results.is_empty() {
        message.push_str("(none available)\n");
    } else {
        for (i, result) in results.iter().enumerate() {
            message.push_str(&format!(
                "[{}] {}\n{}\n{}\n\n",
                i,
                result.title,
                result.url.as_deref().unwrap_or("-"),
                result.snippet
            ));
        }
    }

    message
}

/// User message for the reviser.
pub fn reviser_user_message(input: &TaskInput, critique: &Critique) -> String {
    let mut message = format!(
        "## Question\n{}\n\n## Candidate answer\n{}\n\n## Critique\n",
        input.question, input.answer
    );

    for finding in &critique.findings {
        message.push_str(&format!(
            "- \"{}\": {} ({})",
            finding.claim,
            finding.label,
            finding.justification
        ));
        if let Some(correction) = &finding.correction {
            message.push_str(&format!(" -> \"{}\"", correction));
        }
        message.push('\n');
    }

    message.push_str(&format!("\nSummary: {}\n", critique.summary));
    message
}
