//! Stage agent traits and common types.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use auditor_core::{Critique, CritiqueError, RevisedOutput, RevisionError, TaskInput};

use crate::providers::ProviderError;

/// Errors from stage agents.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Critic output rejected: {0}")]
    Critique(#[from] CritiqueError),

    #[error("Revision rejected: {0}")]
    Revision(#[from] RevisionError),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

/// The critic stage.
///
/// Must terminate with a critique even when knowledge lookup is down; in
/// that case the critique is marked `best_effort`. Lookup failures are
/// never returned as errors.
#[async_trait]
pub trait CriticAgent: Send + Sync {
    async fn critique(&self, input: &TaskInput) -> Result<Critique, AgentError>;

    fn name(&self) -> &str {
        "critic_agent"
    }
}

/// The reviser stage.
///
/// Called only with the critique produced for the same input. A clean
/// critique must yield the answer unchanged.
#[async_trait]
pub trait ReviserAgent: Send + Sync {
    async fn revise(
        &self,
        input: &TaskInput,
        critique: &Critique,
    ) -> Result<RevisedOutput, AgentError>;

    fn name(&self) -> &str {
        "reviser_agent"
    }
}
