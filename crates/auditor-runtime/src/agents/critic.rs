//! Model-backed critic.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use auditor_core::{parse_critique, Critique, Evidence, TaskInput};

use super::{AgentError, CriticAgent};
use crate::knowledge::{KnowledgeSource, SearchHit};
use crate::prompts::{critic_user_message, CRITIC_PROMPT};
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider};
use crate::resilience::CircuitBreaker;

/// Looks the question up, asks the model to label every claim, and
/// attaches the retrieved hits as evidence.
///
/// The lookup, retries included, is abandoned after half the stage timeout
/// so a stalled source degrades the critique instead of failing the stage.
pub struct LlmCritic {
    provider: Arc<dyn LlmProvider>,
    knowledge: Arc<dyn KnowledgeSource>,
    lookup_breaker: Arc<CircuitBreaker<String>>,
    lookup_deadline: Duration,
    config: CompletionConfig,
}

impl LlmCritic {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        knowledge: Arc<dyn KnowledgeSource>,
        config: CompletionConfig,
    ) -> Self {
        Self {
            provider,
            knowledge,
            lookup_breaker: Arc::new(CircuitBreaker::default()),
            lookup_deadline: config.timeout / 2,
            config,
        }
    }

    /// Share a lookup circuit breaker across critics.
    pub fn with_lookup_breaker(mut self, breaker: Arc<CircuitBreaker<String>>) -> Self {
        self.lookup_breaker = breaker;
        self
    }

    /// Hits for the question, and whether the lookup was skipped or failed.
    async fn gather(&self, input: &TaskInput) -> (Vec<SearchHit>, bool) {
        let source = self.knowledge.name().to_string();

        if self.lookup_breaker.is_open(&source) {
            tracing::warn!(source = %source, "Lookup circuit open, critiquing without evidence");
            return (Vec::new(), true);
        }

        let lookup = tokio::time::timeout(self.lookup_deadline, self.knowledge.lookup(&input.question));
        match lookup.await {
            Err(_) => {
                self.lookup_breaker.record_failure(&source);
                tracing::warn!(
                    source = %source,
                    deadline = ?self.lookup_deadline,
                    "Knowledge lookup missed its deadline, critiquing without evidence"
                );
                (Vec::new(), true)
            }
            Ok(Ok(hits)) => {
                self.lookup_breaker.record_success(&source);
                tracing::debug!(source = %source, hits = hits.len(), "Knowledge lookup complete");
                (hits, false)
            }
            Ok(Err(e)) => {
                self.lookup_breaker.record_failure(&source);
                tracing::warn!(
                    source = %source,
                    error = %e,
                    "Knowledge lookup failed, critiquing without evidence"
                );
                (Vec::new(), true)
            }
        }
    }
}

/// Lookup hits first, then any URL the model cited that no hit covers.
fn collect_evidence(hits: &[SearchHit], critique: &Critique) -> Vec<Evidence> {
    let mut evidence: Vec<Evidence> = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| Evidence::from_lookup(&hit.title, &hit.snippet, i, hit.url.as_deref()))
        .collect();

    let known: BTreeSet<&str> = hits.iter().filter_map(|h| h.url.as_deref()).collect();
    let mut cited = BTreeSet::new();
    for source in critique.findings.iter().flat_map(|f| f.sources.iter()) {
        if !known.contains(source.as_str()) && cited.insert(source.as_str()) {
            evidence.push(Evidence::from_citation(source.clone()));
        }
    }

    evidence
}

#[async_trait]
impl CriticAgent for LlmCritic {
    async fn critique(&self, input: &TaskInput) -> Result<Critique, AgentError> {
        let (hits, best_effort) = self.gather(input).await;

        let messages = vec![
            ChatMessage::system(CRITIC_PROMPT),
            ChatMessage::user(critic_user_message(input, &hits)),
        ];
        let response = self.provider.complete(messages, &self.config).await?;

        let mut critique = parse_critique(&response.content, input)?;
        critique.evidence = collect_evidence(&hits, &critique);
        critique.best_effort = best_effort;

        tracing::info!(
            findings = critique.findings.len(),
            discrepancies = critique.discrepancies().count(),
            best_effort,
            "Critique complete"
        );
        Ok(critique)
    }
}
