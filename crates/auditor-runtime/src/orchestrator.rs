//! Pipeline orchestrator: critic, then reviser, once each.
//!
//! The orchestrator owns the run typestate, so the reviser can only see a
//! critique produced for the same input in the same run. Each stage runs
//! under its own timeout and circuit breaker; any stage failure fails the
//! run with no partial output. Independent runs share only the internally
//! synchronized resilience state and may execute concurrently.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use auditor_core::{
    AuditOutcome, AuditRun, DefinitionError, PipelineDefinition, RevisionError, Stage, TaskInput,
    Verdict,
};

use crate::agents::{AgentError, CriticAgent, LlmCritic, LlmReviser, ReviserAgent};
use crate::cache::RunCache;
use crate::config::{ConfigError, KnowledgeConfig, KnowledgeKind, RuntimeConfig};
use crate::knowledge::{
    FrozenKnowledge, KnowledgeSource, LookupError, OfflineKnowledge, ResilientLookup,
};
use crate::providers::{LlmProvider, ProviderError, ProviderRegistry};
use crate::resilience::{BudgetTracker, CircuitBreaker, LlmUsage, MeteredProvider};

/// Errors from a pipeline run or from building a pipeline.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Invalid task input: {0}")]
    InvalidInput(String),

    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: AgentError,
    },

    #[error("{stage} stage timed out after {timeout:?}")]
    Timeout { stage: Stage, timeout: Duration },

    #[error("{stage} circuit open, failing fast")]
    CircuitOpen { stage: Stage },

    #[error("Revision violates the critique: {0}")]
    Revision(#[from] RevisionError),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Knowledge source error: {0}")]
    Knowledge(#[from] LookupError),

    #[error("Invalid pipeline definition: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Wall-clock time spent in one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: u64,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub pipeline: String,
    pub outcome: AuditOutcome,
    pub verdict: Verdict,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Stages in execution order; empty for a cached report
    pub timings: Vec<StageTiming>,

    pub cached: bool,
}

impl AuditReport {
    pub fn revised_answer(&self) -> &str {
        &self.outcome.revised.answer
    }
}

/// The sequential verification pipeline.
pub struct AuditPipeline {
    definition: PipelineDefinition,
    critic: Arc<dyn CriticAgent>,
    reviser: Arc<dyn ReviserAgent>,
    config: RuntimeConfig,
    circuit_breaker: CircuitBreaker<Stage>,
    budget: Arc<BudgetTracker>,
    cache: Option<RunCache>,
}

impl AuditPipeline {
    pub fn builder() -> AuditPipelineBuilder {
        AuditPipelineBuilder::new()
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run critic then reviser over one input.
    pub async fn run(&self, input: TaskInput) -> Result<AuditReport, RuntimeError> {
        input
            .validate()
            .map_err(|e| RuntimeError::InvalidInput(e.to_string()))?;
        let started_at = Utc::now();

        if let Some(cache) = &self.cache {
            if let Some(outcome) = cache.get(&input).await {
                tracing::debug!(pipeline = %self.definition.name, "Serving cached run");
                return Ok(self.report(outcome, started_at, Vec::new(), true));
            }
        }

        let run = AuditRun::new(input);

        let (critique, critic_timing) = self
            .run_stage(Stage::Critic, true, self.critic.critique(run.input()))
            .await?;
        let run = run.record_critique(critique);

        // Clean critiques bypass the reviser circuit.
        let guarded = run.critique().has_discrepancies();
        let (revised, reviser_timing) = self
            .run_stage(
                Stage::Reviser,
                guarded,
                self.reviser.revise(run.input(), run.critique()),
            )
            .await?;
        let outcome = run.complete(revised)?;

        if let Some(cache) = &self.cache {
            if outcome.critique.best_effort {
                tracing::debug!("Best-effort critique, not caching run");
            } else {
                cache.insert(outcome.clone()).await;
            }
        }

        let report = self.report(outcome, started_at, vec![critic_timing, reviser_timing], false);
        tracing::info!(
            pipeline = %report.pipeline,
            verdict = ?report.verdict,
            changed = report.outcome.changed(),
            best_effort = report.outcome.critique.best_effort,
            "Audit run complete"
        );
        Ok(report)
    }

    /// Run independent inputs concurrently, bounded by `max_concurrent_runs`.
    ///
    /// Results come back in input order; one failure does not affect others.
    pub async fn run_batch(&self, inputs: Vec<TaskInput>) -> Vec<Result<AuditReport, RuntimeError>> {
        stream::iter(inputs)
            .map(|input| self.run(input))
            .buffered(self.config.max_concurrent_runs.max(1))
            .collect()
            .await
    }

    /// Model usage across every run of this pipeline.
    pub fn usage(&self) -> LlmUsage {
        self.budget.usage()
    }

    /// Run one stage under its timeout. Only `guarded` runs consult and
    /// update the stage's circuit breaker.
    async fn run_stage<T, F>(
        &self,
        stage: Stage,
        guarded: bool,
        work: F,
    ) -> Result<(T, StageTiming), RuntimeError>
    where
        F: Future<Output = Result<T, AgentError>>,
    {
        let stage_name = self
            .definition
            .stage(stage)
            .map(|s| s.name.as_str())
            .unwrap_or(stage.name());

        if guarded && self.circuit_breaker.is_open(&stage) {
            tracing::warn!(stage = %stage_name, "Circuit open, failing run");
            return Err(RuntimeError::CircuitOpen { stage });
        }

        let timeout = self.config.stage_timeout(stage);
        let start = Instant::now();

        let result = tokio::time::timeout(timeout, work).await;
        let timing = StageTiming {
            stage,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        match result {
            Ok(Ok(value)) => {
                if guarded {
                    self.circuit_breaker.record_success(&stage);
                }
                tracing::debug!(stage = %stage_name, elapsed_ms = timing.elapsed_ms, "Stage complete");
                Ok((value, timing))
            }
            Ok(Err(e)) => {
                if guarded {
                    self.circuit_breaker.record_failure(&stage);
                }
                tracing::warn!(stage = %stage_name, error = %e, "Stage failed");
                Err(RuntimeError::StageFailed { stage, source: e })
            }
            Err(_) => {
                if guarded {
                    self.circuit_breaker.record_failure(&stage);
                }
                tracing::warn!(stage = %stage_name, timeout = ?timeout, "Stage timed out");
                Err(RuntimeError::Timeout { stage, timeout })
            }
        }
    }

    fn report(
        &self,
        outcome: AuditOutcome,
        started_at: DateTime<Utc>,
        timings: Vec<StageTiming>,
        cached: bool,
    ) -> AuditReport {
        AuditReport {
            pipeline: self.definition.name.clone(),
            verdict: outcome.critique.verdict(),
            outcome,
            started_at,
            finished_at: Utc::now(),
            timings,
            cached,
        }
    }
}

/// Build a knowledge source from configuration.
pub fn knowledge_from_config(
    config: &KnowledgeConfig,
) -> Result<Arc<dyn KnowledgeSource>, RuntimeError> {
    match config.source {
        KnowledgeKind::Offline => Ok(Arc::new(OfflineKnowledge)),
        KnowledgeKind::Frozen => {
            let path = config.facts.as_ref().ok_or_else(|| {
                ConfigError::Invalid("frozen knowledge requires a facts file".to_string())
            })?;
            Ok(Arc::new(FrozenKnowledge::from_yaml_file(path)?))
        }
        #[cfg(feature = "web-search")]
        KnowledgeKind::Web => Ok(Arc::new(crate::knowledge::WebSearch::from_env()?)),
        #[cfg(not(feature = "web-search"))]
        KnowledgeKind::Web => Err(RuntimeError::Knowledge(LookupError::NotConfigured(
            "web search requires the 'web-search' feature".to_string(),
        ))),
    }
}

/// Builder for [`AuditPipeline`].
///
/// Critic and reviser default to the model-backed agents over `provider`;
/// either can be replaced. Without a knowledge source every critique is
/// best-effort.
pub struct AuditPipelineBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    knowledge: Option<Arc<dyn KnowledgeSource>>,
    critic: Option<Arc<dyn CriticAgent>>,
    reviser: Option<Arc<dyn ReviserAgent>>,
    config: RuntimeConfig,
    definition: PipelineDefinition,
}

impl AuditPipelineBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            knowledge: None,
            critic: None,
            reviser: None,
            config: RuntimeConfig::default(),
            definition: PipelineDefinition::llm_auditor(),
        }
    }

    /// Provider and knowledge source as described by `config`.
    pub fn from_config(
        config: RuntimeConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;
        let provider = registry.create(&config.provider.name, &config.provider.options)?;
        let knowledge = knowledge_from_config(&config.knowledge)?;
        Ok(Self::new()
            .provider(provider)
            .knowledge(knowledge)
            .config(config))
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn knowledge(mut self, knowledge: Arc<dyn KnowledgeSource>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn critic(mut self, critic: Arc<dyn CriticAgent>) -> Self {
        self.critic = Some(critic);
        self
    }

    pub fn reviser(mut self, reviser: Arc<dyn ReviserAgent>) -> Self {
        self.reviser = Some(reviser);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn definition(mut self, definition: PipelineDefinition) -> Self {
        self.definition = definition;
        self
    }

    pub fn build(self) -> Result<AuditPipeline, RuntimeError> {
        self.config.validate()?;
        self.definition.validate()?;

        let budget = Arc::new(BudgetTracker::new(&self.config.budgets));
        let provider = self.provider;
        let metered = |stage: Stage| -> Result<Arc<dyn LlmProvider>, RuntimeError> {
            let inner = provider.clone().ok_or_else(|| {
                RuntimeError::ProviderNotConfigured(format!("no provider for the {} stage", stage))
            })?;
            Ok(Arc::new(MeteredProvider::new(inner, budget.clone(), stage)))
        };

        let critic: Arc<dyn CriticAgent> = match self.critic {
            Some(critic) => critic,
            None => {
                let knowledge: Arc<dyn KnowledgeSource> = match self.knowledge {
                    Some(knowledge) => knowledge,
                    None => Arc::new(OfflineKnowledge),
                };
                let lookup = Arc::new(ResilientLookup::new(knowledge, self.config.lookup.clone()));
                let breaker = Arc::new(CircuitBreaker::new(self.config.circuit_breaker.clone()));
                Arc::new(
                    LlmCritic::new(metered(Stage::Critic)?, lookup, self.config.critic.completion_config())
                        .with_lookup_breaker(breaker),
                )
            }
        };

        let reviser: Arc<dyn ReviserAgent> = match self.reviser {
            Some(reviser) => reviser,
            None => Arc::new(LlmReviser::new(
                metered(Stage::Reviser)?,
                self.config.reviser.completion_config(),
            )),
        };

        let cache = self
            .config
            .cache
            .enabled
            .then(|| RunCache::from_config(&self.config.cache));

        Ok(AuditPipeline {
            definition: self.definition,
            critic,
            reviser,
            circuit_breaker: CircuitBreaker::new(self.config.circuit_breaker.clone()),
            budget,
            cache,
            config: self.config,
        })
    }
}

impl Default for AuditPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
