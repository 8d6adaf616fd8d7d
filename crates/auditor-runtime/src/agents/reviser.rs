//! Revisers: model-backed, and a deterministic span splicer.

use async_trait::async_trait;
use std::sync::Arc;

use auditor_core::{
    apply_corrections, verify_revision, Critique, RevisedOutput, RevisionMethod, TaskInput,
};

use super::{AgentError, ReviserAgent};
use crate::prompts::{reviser_user_message, REVISER_PROMPT};
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider};

/// Drop a surrounding markdown fence if the model added one anyway.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
        return body.trim_end().strip_suffix("```").unwrap_or(body).trim();
    }
    trimmed
}

/// Rewrites the answer with a model.
///
/// A clean critique returns the answer untouched without calling the model.
/// A model rewrite that fails verification falls back to splicing the
/// critic's corrections; if that is impossible too, the revision fails.
pub struct LlmReviser {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
}

impl LlmReviser {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self { provider, config }
    }
}

#[async_trait]
impl ReviserAgent for LlmReviser {
    async fn revise(
        &self,
        input: &TaskInput,
        critique: &Critique,
    ) -> Result<RevisedOutput, AgentError> {
        if !critique.has_discrepancies() {
            tracing::debug!("No discrepancies, returning answer unchanged");
            return Ok(RevisedOutput::unchanged(input.answer.clone()));
        }

        let messages = vec![
            ChatMessage::system(REVISER_PROMPT),
            ChatMessage::user(reviser_user_message(input, critique)),
        ];
        let response = self.provider.complete(messages, &self.config).await?;
        let candidate = strip_fences(&response.content);

        match verify_revision(&input.answer, critique, candidate) {
            Ok(()) => Ok(RevisedOutput::rewritten(candidate, RevisionMethod::Model)),
            Err(model_err) => {
                tracing::warn!(error = %model_err, "Model revision rejected, splicing corrections");
                let spliced = apply_corrections(&input.answer, critique)
                    .map_err(|_| AgentError::Revision(model_err.clone()))?;
                verify_revision(&input.answer, critique, &spliced)
                    .map_err(|_| AgentError::Revision(model_err))?;
                Ok(RevisedOutput::rewritten(spliced, RevisionMethod::SpanReplacement))
            }
        }
    }
}

/// Splices critic corrections into the answer; never calls a model.
///
/// Fails when a flagged claim has no correction or cannot be located.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanReviser;

#[async_trait]
impl ReviserAgent for SpanReviser {
    async fn revise(
        &self,
        input: &TaskInput,
        critique: &Critique,
    ) -> Result<RevisedOutput, AgentError> {
        if !critique.has_discrepancies() {
            return Ok(RevisedOutput::unchanged(input.answer.clone()));
        }
        let answer = apply_corrections(&input.answer, critique)?;
        verify_revision(&input.answer, critique, &answer)?;
        Ok(RevisedOutput::rewritten(answer, RevisionMethod::SpanReplacement))
    }

    fn name(&self) -> &str {
        "span_reviser"
    }
}
