//! Anthropic Messages API provider.
//!
//! The critic and reviser system prompts are identical on every run, so they
//! are sent as a cacheable system block unless `cache_system_prompt` is off.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    split_system, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    TokenUsage,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable name for the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    cache_system_prompt: bool,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("cache_system_prompt", &self.cache_system_prompt)
            .finish()
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .unwrap_or_default()
}

impl AnthropicProvider {
    fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_system_prompt: true,
            client: http_client(),
        }
    }

    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "Anthropic API key",
        ))
    }

    /// Create from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(ANTHROPIC_API_KEY_ENV, "Anthropic API key")?;
        Ok(Self::with_credential(credential))
    }

    /// Create from JSON configuration, falling back to `ANTHROPIC_API_KEY`.
    ///
    /// Recognized keys: `api_key`, `base_url`, `cache_system_prompt`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            ANTHROPIC_API_KEY_ENV,
            "Anthropic API key",
        )?;

        let mut provider = Self::with_credential(credential);
        if let Some(url) = config["base_url"].as_str() {
            provider.base_url = url.to_string();
        }
        if let Some(cache) = config["cache_system_prompt"].as_bool() {
            provider.cache_system_prompt = cache;
        }
        Ok(provider)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_system_prompt_cache(mut self, enabled: bool) -> Self {
        self.cache_system_prompt = enabled;
        self
    }

    fn build_request(&self, messages: Vec<ChatMessage>, config: &CompletionConfig) -> MessagesRequest {
        let (system, turns) = split_system(messages);
        let cache_control = self.cache_system_prompt.then_some(CacheControl::EPHEMERAL);

        MessagesRequest {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system: system
                .map(|text| {
                    vec![SystemBlock {
                        kind: "text",
                        text,
                        cache_control,
                    }]
                })
                .unwrap_or_default(),
            messages: turns
                .into_iter()
                .map(|msg| Turn {
                    role: msg.role.as_str(),
                    content: msg.content,
                })
                .collect(),
            temperature: config.temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlock>,
    messages: Vec<Turn>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct SystemBlock {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl CacheControl {
    const EPHEMERAL: CacheControl = CacheControl { kind: "ephemeral" };
}

#[derive(Debug, Serialize)]
struct Turn {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Map a non-success status to a provider error.
///
/// The body is used verbatim when it is not an Anthropic error envelope.
fn status_error(status: StatusCode, headers: &HeaderMap, body: &str) -> ProviderError {
    match status.as_u16() {
        429 => ProviderError::RateLimited {
            retry_after: headers
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs),
        },
        401 | 403 => ProviderError::AuthError,
        code => ProviderError::ApiError {
            status: code,
            message: serde_json::from_str::<ErrorEnvelope>(body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.to_string()),
        },
    }
}

fn into_completion(body: MessagesResponse) -> Result<CompletionResponse, ProviderError> {
    let content: String = body.content.into_iter().filter_map(|block| block.text).collect();

    if content.trim().is_empty() {
        return Err(ProviderError::EmptyCompletion);
    }
    if body.stop_reason.as_deref() == Some("max_tokens") {
        tracing::warn!(model = %body.model, "Completion truncated at max_tokens");
    }

    Ok(CompletionResponse {
        content,
        usage: TokenUsage {
            prompt_tokens: body.usage.input_tokens,
            completion_tokens: body.usage.output_tokens,
            cache_read_tokens: body.usage.cache_read_input_tokens,
        },
        model: body.model,
        stop_reason: body.stop_reason,
    })
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = self.build_request(messages, config);

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &headers, &body));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        into_completion(body)
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Factory for [`AnthropicProvider`].
///
/// ```json
/// {
///   "api_key": "sk-ant-...",
///   "base_url": "https://...",
///   "cache_system_prompt": true
/// }
/// ```
pub struct AnthropicProviderFactory;

impl ProviderFactory for AnthropicProviderFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(AnthropicProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", ANTHROPIC_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Anthropic API key required: set 'api_key' in config or {} env",
                ANTHROPIC_API_KEY_ENV
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        if !config["cache_system_prompt"].is_null() && !config["cache_system_prompt"].is_boolean()
        {
            return Err(ProviderError::NotConfigured(
                "cache_system_prompt must be a boolean".to_string(),
            ));
        }

        Ok(())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({ "cache_system_prompt": true })
    }

    fn description(&self) -> &'static str {
        "Anthropic Claude provider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn critic_messages() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("You are the critic."),
            ChatMessage::user("Question: Who built the Berlin Wall?"),
        ]
    }

    #[test]
    fn test_system_prompt_sent_as_cached_block() {
        let provider = AnthropicProvider::new("test-key");
        let request = provider.build_request(critic_messages(), &CompletionConfig::default());
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["system"][0]["type"], "text");
        assert_eq!(value["system"][0]["text"], "You are the critic.");
        assert_eq!(value["system"][0]["cache_control"]["type"], "ephemeral");
        assert_eq!(value["messages"].as_array().unwrap().len(), 1);
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn test_cache_can_be_disabled() {
        let provider = AnthropicProvider::new("test-key").with_system_prompt_cache(false);
        let request = provider.build_request(critic_messages(), &CompletionConfig::default());
        let value = serde_json::to_value(&request).unwrap();
        assert!(value["system"][0].get("cache_control").is_none());
    }

    #[test]
    fn test_no_system_field_without_system_message() {
        let provider = AnthropicProvider::new("test-key");
        let request = provider.build_request(
            vec![ChatMessage::user("hello")],
            &CompletionConfig::default(),
        );
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("system").is_none());
    }

    #[test]
    fn test_text_blocks_joined_and_usage_mapped() {
        let body: MessagesResponse = serde_json::from_value(serde_json::json!({
            "content": [{"type": "text", "text": "{\"findings\": []"}, {"type": "text", "text": ", \"summary\": \"ok\"}"}],
            "model": "claude-sonnet-4-5",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 900, "output_tokens": 40, "cache_read_input_tokens": 800}
        }))
        .unwrap();

        let completion = into_completion(body).unwrap();
        assert_eq!(completion.content, "{\"findings\": [], \"summary\": \"ok\"}");
        assert_eq!(completion.usage.cache_read_tokens, 800);
        assert_eq!(completion.usage.total(), 940);
    }

    #[test]
    fn test_blank_completion_rejected() {
        let body: MessagesResponse = serde_json::from_value(serde_json::json!({
            "content": [{"type": "text", "text": "  "}],
            "model": "claude-sonnet-4-5",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 1}
        }))
        .unwrap();
        assert!(matches!(into_completion(body), Err(ProviderError::EmptyCompletion)));
    }

    #[test]
    fn test_status_errors() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", "7".parse().unwrap());
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, &headers, ""),
            ProviderError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(7)
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, &HeaderMap::new(), ""),
            ProviderError::AuthError
        ));

        let enveloped = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        match status_error(StatusCode::SERVICE_UNAVAILABLE, &HeaderMap::new(), enveloped) {
            ProviderError::ApiError { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Overloaded");
            }
            other => panic!("unexpected error: {}", other),
        }

        match status_error(StatusCode::BAD_GATEWAY, &HeaderMap::new(), "upstream down") {
            ProviderError::ApiError { message, .. } => assert_eq!(message, "upstream down"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_factory_validates_options() {
        let factory = AnthropicProviderFactory;
        assert!(factory
            .validate_config(&serde_json::json!({ "api_key": "k", "base_url": "invalid-url" }))
            .is_err());
        assert!(factory
            .validate_config(&serde_json::json!({ "api_key": "k", "cache_system_prompt": "yes" }))
            .is_err());
        assert!(factory
            .validate_config(&serde_json::json!({ "api_key": "k", "cache_system_prompt": false }))
            .is_ok());
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "sk-ant-REDACTED";
        let provider = AnthropicProvider::new(secret_key);

        let debug_output = format!("{:?}", provider);
        assert!(!debug_output.contains(secret_key));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
