//! Google Gemini `generateContent` provider.
//!
//! With `"grounding": true` the request enables the built-in Google Search
//! tool, so the critic can verify claims against the web even when no
//! separate [`KnowledgeSource`](crate::knowledge::KnowledgeSource) is wired.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    split_system, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    Role, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable name for the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider.
pub struct GeminiProvider {
    credential: ApiCredential,
    base_url: String,
    grounding: bool,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("grounding", &self.grounding)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(api_key, CredentialSource::Programmatic, "Gemini API key"),
            base_url: DEFAULT_BASE_URL.to_string(),
            grounding: false,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Create from JSON configuration, falling back to `GEMINI_API_KEY`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential =
            ApiCredential::from_config_or_env(config, "api_key", GEMINI_API_KEY_ENV, "Gemini API key")?;

        let mut provider = Self::new("");
        provider.credential = credential;
        if let Some(url) = config["base_url"].as_str() {
            provider.base_url = url.to_string();
        }
        provider.grounding = config["grounding"].as_bool().unwrap_or(false);
        Ok(provider)
    }

    /// Enable the Google Search grounding tool.
    pub fn with_grounding(mut self, enabled: bool) -> Self {
        self.grounding = enabled;
        self
    }

    fn build_request(&self, messages: Vec<ChatMessage>, config: &CompletionConfig) -> GeminiRequest {
        let (system, turns) = split_system(messages);

        GeminiRequest {
            system_instruction: system.map(|text| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text }],
            }),
            contents: turns
                .into_iter()
                .map(|msg| GeminiContent {
                    role: Some(match msg.role {
                        Role::Assistant => "model".to_string(),
                        _ => "user".to_string(),
                    }),
                    parts: vec![GeminiPart { text: msg.content }],
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_tokens,
            },
            tools: if self.grounding {
                vec![serde_json::json!({ "google_search": {} })]
            } else {
                Vec::new()
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<JsonValue>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: UsageMetadata,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    cached_content_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

fn into_completion(body: GeminiResponse, requested_model: &str) -> Result<CompletionResponse, ProviderError> {
    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyCompletion)?;

    let content = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(ProviderError::EmptyCompletion);
    }

    Ok(CompletionResponse {
        content,
        usage: TokenUsage {
            prompt_tokens: body.usage_metadata.prompt_token_count,
            completion_tokens: body.usage_metadata.candidates_token_count,
            cache_read_tokens: body.usage_metadata.cached_content_token_count,
        },
        model: body
            .model_version
            .unwrap_or_else(|| requested_model.to_string()),
        stop_reason: candidate.finish_reason,
    })
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = self.build_request(messages, config);

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, config.model
            ))
            .header("x-goog-api-key", self.credential.expose())
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

        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after: None });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let message = match response.json::<GeminiError>().await {
                Ok(body) => body.error.message,
                Err(e) => e.to_string(),
            };
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        into_completion(body, &config.model)
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Factory for [`GeminiProvider`].
///
/// ```json
/// {
///   "api_key": "AIza...",
///   "base_url": "https://...",
///   "grounding": true
/// }
/// ```
pub struct GeminiProviderFactory;

impl ProviderFactory for GeminiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "gemini"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(GeminiProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", GEMINI_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Gemini API key required: set 'api_key' in config or {} env",
                GEMINI_API_KEY_ENV
            )));
        }
        if !config["grounding"].is_null() && !config["grounding"].is_boolean() {
            return Err(ProviderError::NotConfigured(
                "grounding must be a boolean".to_string(),
            ));
        }
        Ok(())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({ "model": "gemini-2.5-flash", "grounding": false })
    }

    fn description(&self) -> &'static str {
        "Google Gemini provider with optional search grounding"
    }
}
