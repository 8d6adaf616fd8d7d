//! # auditor-runtime
//!
//! Model-backed execution of the auditor pipeline.
//!
//! `auditor-core` decides what a valid critique and a valid revision look
//! like. This crate produces them: it calls LLM providers, looks claims up
//! in a knowledge source, enforces timeouts, budgets and circuit breakers,
//! and pushes the pipeline definition to a hosting runtime.
//!
//! ## Failure handling
//!
//! - A knowledge lookup failure is absorbed by the critic; the critique is
//!   marked best-effort.
//! - A critic or reviser failure fails the whole run. No partial output.
//! - A deployment failure is logged and returned unchanged. No retry.
//!
//! ## Example
//!
//! ```rust,ignore
//! use auditor_core::TaskInput;
//! use auditor_runtime::{AuditPipeline, GeminiProvider, FrozenKnowledge};
//! use std::sync::Arc;
//!
//! let pipeline = AuditPipeline::builder()
//!     .provider(Arc::new(GeminiProvider::from_env()?))
//!     .knowledge(Arc::new(FrozenKnowledge::from_yaml_file("facts.yaml")?))
//!     .build()?;
//!
//! let report = pipeline
//!     .run(TaskInput::new(
//!         "Who built the Berlin Wall?",
//!         "The Berlin Wall was built by the United States in 1961.",
//!     ))
//!     .await?;
//! println!("{}", report.revised_answer());
//! ```

pub mod agents;
pub mod cache;
pub mod config;
pub mod deploy;
pub mod knowledge;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;

pub use agents::{AgentError, CriticAgent, LlmCritic, LlmReviser, ReviserAgent, SpanReviser};
pub use cache::RunCache;
pub use config::{ConfigError, RuntimeConfig};
pub use deploy::{DeployConfig, DeployError, Deployer, DeploymentReceipt, DeploymentSpec, DeploymentTarget};
pub use knowledge::{
    FrozenKnowledge, KnowledgeSource, LookupError, OfflineKnowledge, ResilientLookup, SearchHit,
};
pub use orchestrator::{
    knowledge_from_config, AuditPipeline, AuditPipelineBuilder, AuditReport, RuntimeError,
    StageTiming,
};
pub use providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ProviderRegistry, Role, TokenUsage,
};
pub use resilience::{BudgetTracker, CircuitBreaker, LlmUsage};

#[cfg(feature = "anthropic")]
pub use providers::AnthropicProvider;
#[cfg(feature = "gemini")]
pub use providers::GeminiProvider;
#[cfg(feature = "web-search")]
pub use knowledge::WebSearch;
#[cfg(feature = "vertex")]
pub use deploy::AgentEngineClient;
