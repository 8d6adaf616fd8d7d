//! Token budgets and usage accounting.
//!
//! Every model call made by a stage goes through a [`MeteredProvider`],
//! which refuses the call when the stage or global budget cannot cover the
//! prompt and records the reported usage afterwards.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use auditor_core::Stage;

use crate::config::BudgetConfig;
use crate::providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};

/// Token budget for one scope (a stage, or the whole pipeline).
pub struct TokenBudget {
    pub max_tokens: u32,
    used: AtomicU32,
}

impl TokenBudget {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            used: AtomicU32::new(0),
        }
    }

    pub fn can_afford(&self, tokens: u32) -> bool {
        self.remaining() >= tokens
    }

    /// Saturates at `u32::MAX`; an exhausted budget never wraps back.
    pub fn record(&self, tokens: u32) {
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                Some(used.saturating_add(tokens))
            });
    }

    pub fn remaining(&self) -> u32 {
        self.max_tokens.saturating_sub(self.used.load(Ordering::SeqCst))
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.used.store(0, Ordering::SeqCst);
    }
}

/// Accumulated model usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub llm_calls: u64,

    /// Estimated cost in USD
    pub estimated_cost: f64,

    /// Tokens served from a provider-side cache
    pub cache_read_tokens: u64,
}

impl LlmUsage {
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(usage.prompt_tokens.into());
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(usage.completion_tokens.into());
        self.total_tokens = self.total_tokens.saturating_add(usage.total().into());
        self.cache_read_tokens = self
            .cache_read_tokens
            .saturating_add(usage.cache_read_tokens.into());
        self.llm_calls = self.llm_calls.saturating_add(1);
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    fn merge(mut self, other: &LlmUsage) -> Self {
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.llm_calls = self.llm_calls.saturating_add(other.llm_calls);
        self.cache_read_tokens = self.cache_read_tokens.saturating_add(other.cache_read_tokens);
        self.estimated_cost += other.estimated_cost;
        self
    }

    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens: (input, output, cache read)
        let (input_rate, output_rate, cache_read_rate) = match model {
            m if m.contains("gemini-2.5-pro") => (1.25, 10.0, 0.31),
            m if m.contains("gemini-2.5-flash-lite") => (0.1, 0.4, 0.025),
            m if m.contains("gemini-2.5-flash") => (0.3, 2.5, 0.075),
            m if m.contains("sonnet-4-5") => (3.0, 15.0, 0.3),
            m if m.contains("opus-4-5") => (5.0, 25.0, 0.5),
            m if m.contains("haiku-4-5") => (1.0, 5.0, 0.1),
            _ => (0.3, 2.5, 0.075),
        };

        let uncached = usage.prompt_tokens.saturating_sub(usage.cache_read_tokens);
        (uncached as f64 / 1_000_000.0) * input_rate
            + (usage.completion_tokens as f64 / 1_000_000.0) * output_rate
            + (usage.cache_read_tokens as f64 / 1_000_000.0) * cache_read_rate
    }
}

/// Global and per-stage budgets plus usage, shared by all runs of a pipeline.
pub struct BudgetTracker {
    stage_budgets: BTreeMap<Stage, TokenBudget>,
    global_budget: TokenBudget,
    usage: RwLock<BTreeMap<Stage, LlmUsage>>,
}

impl BudgetTracker {
    pub fn new(config: &BudgetConfig) -> Self {
        let stage_budgets = Stage::ORDER
            .into_iter()
            .map(|stage| (stage, TokenBudget::new(config.stage_max(stage))))
            .collect();

        Self {
            stage_budgets,
            global_budget: TokenBudget::new(config.global_max_tokens),
            usage: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn can_afford(&self, stage: Stage, estimated_tokens: u32) -> bool {
        let stage_ok = self
            .stage_budgets
            .get(&stage)
            .map(|b| b.can_afford(estimated_tokens))
            .unwrap_or(true);

        stage_ok && self.global_budget.can_afford(estimated_tokens)
    }

    pub fn record_usage(&self, stage: Stage, usage: &TokenUsage, model: &str) {
        let total = usage.total();
        if let Some(budget) = self.stage_budgets.get(&stage) {
            budget.record(total);
        }
        self.global_budget.record(total);
        self.usage.write().entry(stage).or_default().add(usage, model);
    }

    /// Usage summed over both stages.
    pub fn usage(&self) -> LlmUsage {
        let usage = self.usage.read();
        usage.values().fold(LlmUsage::default(), LlmUsage::merge)
    }

    pub fn stage_usage(&self, stage: Stage) -> LlmUsage {
        self.usage.read().get(&stage).cloned().unwrap_or_default()
    }

    /// The smaller of the stage and global remainders.
    pub fn remaining(&self, stage: Stage) -> u32 {
        let stage_remaining = self
            .stage_budgets
            .get(&stage)
            .map(|b| b.remaining())
            .unwrap_or(u32::MAX);
        stage_remaining.min(self.global_budget.remaining())
    }

    pub fn remaining_global(&self) -> u32 {
        self.global_budget.remaining()
    }

    pub fn reset(&self) {
        for budget in self.stage_budgets.values() {
            budget.reset();
        }
        self.global_budget.reset();
        self.usage.write().clear();
    }
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::new(&BudgetConfig::default())
    }
}

/// Provider wrapper that charges every call to one stage's budget.
pub struct MeteredProvider {
    inner: Arc<dyn LlmProvider>,
    tracker: Arc<BudgetTracker>,
    stage: Stage,
}

impl MeteredProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, tracker: Arc<BudgetTracker>, stage: Stage) -> Self {
        Self {
            inner,
            tracker,
            stage,
        }
    }
}

#[async_trait]
impl LlmProvider for MeteredProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let estimated: u32 = messages
            .iter()
            .map(|m| self.inner.estimate_tokens(&m.content))
            .sum();

        if !self.tracker.can_afford(self.stage, estimated) {
            let remaining = self.tracker.remaining(self.stage);
            tracing::warn!(
                stage = ?self.stage,
                estimated,
                remaining,
                "Token budget exhausted, refusing model call"
            );
            return Err(ProviderError::BudgetExceeded {
                requested: estimated,
                remaining,
            });
        }

        let response = self.inner.complete(messages, config).await?;
        self.tracker
            .record_usage(self.stage, &response.usage, &response.model);
        tracing::debug!(
            stage = ?self.stage,
            tokens = response.usage.total(),
            model = %response.model,
            "Model call metered"
        );
        Ok(response)
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn estimate_tokens(&self, text: &str) -> u32 {
        self.inner.estimate_tokens(text)
    }
}
