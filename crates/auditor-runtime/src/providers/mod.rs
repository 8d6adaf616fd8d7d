//! LLM provider abstractions for the critic and reviser agents.
//!
//! Both stages talk to a model only through [`LlmProvider`], so either can
//! run on Anthropic, Gemini, or a scripted test double.
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;

#[cfg(feature = "gemini")]
mod gemini;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialBuilder, CredentialSet, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory};

#[cfg(feature = "gemini")]
pub use gemini::{GeminiProvider, GeminiProviderFactory};

/// Failure of a single completion call. Model calls are not retried.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("Provider returned {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("Malformed provider response: {0}")]
    ParseError(String),
    #[error("Provider rejected credentials")]
    AuthError,
    #[error("No response within {0:?}")]
    Timeout(Duration),
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
    #[error("Stage token budget exhausted ({requested} requested, {remaining} left)")]
    BudgetExceeded { requested: u32, remaining: u32 },
    #[error("Model returned no text")]
    EmptyCompletion,
}

/// Per-call model settings; each stage carries its own.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub model: String,
    pub max_tokens: u32,
    /// 0.0 keeps repeated audits of the same input stable.
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Speaker of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of an agent conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Stage instructions; providers hoist these out of the turn list.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Split a conversation into its system prompt and the remaining turns.
///
/// Multiple system messages are joined in order.
#[cfg_attr(not(any(feature = "anthropic", feature = "gemini")), allow(dead_code))]
pub(crate) fn split_system(messages: Vec<ChatMessage>) -> (Option<String>, Vec<ChatMessage>) {
    let mut system: Vec<String> = Vec::new();
    let mut others = Vec::new();

    for msg in messages {
        if msg.is_system() {
            system.push(msg.content);
        } else {
            others.push(msg);
        }
    }

    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    (system, others)
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,
    /// Model that actually served the call, as reported by the provider.
    pub model: String,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// Prompt tokens served from a provider-side cache. Already counted in
    /// `prompt_tokens`.
    pub cache_read_tokens: u32,
}

impl TokenUsage {
    /// Tokens charged against a stage budget.
    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// A chat-completion backend.
///
/// Agents hold an `Arc<dyn LlmProvider>`; the orchestrator wraps it in a
/// [`MeteredProvider`](crate::resilience::MeteredProvider) so every call is
/// charged to the calling stage's budget.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Cheap local check; does not call the API.
    async fn health_check(&self) -> bool;

    /// Name used in logs and usage records.
    fn name(&self) -> &str;

    /// Rough pre-call estimate for budget checks, four bytes per token.
    fn estimate_tokens(&self, text: &str) -> u32 {
        text.len().div_ceil(4) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roles() {
        assert!(ChatMessage::system("You are a critic.").is_system());
        assert_eq!(ChatMessage::user("Check this.").role, Role::User);

        let value = serde_json::to_value(ChatMessage::assistant("Done.")).unwrap();
        assert_eq!(value["role"], "assistant");
    }

    #[test]
    fn test_split_system_joins_system_messages() {
        let (system, rest) = split_system(vec![
            ChatMessage::system("one"),
            ChatMessage::user("question"),
            ChatMessage::system("two"),
        ]);
        assert_eq!(system.as_deref(), Some("one\n\ntwo"));
        assert_eq!(rest, vec![ChatMessage::user("question")]);
    }

    #[test]
    fn test_split_system_without_system() {
        let (system, rest) = split_system(vec![ChatMessage::user("q")]);
        assert!(system.is_none());
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 50,
            cache_read_tokens: 0,
        };
        assert_eq!(usage.total(), 150);
    }
}
