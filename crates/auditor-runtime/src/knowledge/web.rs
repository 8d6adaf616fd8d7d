//! Google Programmable Search backend.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

use super::{KnowledgeSource, LookupError, SearchHit};
use crate::providers::{ApiCredential, CredentialBuilder};

pub const SEARCH_API_KEY_ENV: &str = "GOOGLE_SEARCH_API_KEY";
pub const SEARCH_ENGINE_ID_ENV: &str = "GOOGLE_SEARCH_ENGINE_ID";

const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Web search through the Custom Search JSON API.
pub struct WebSearch {
    api_key: ApiCredential,
    engine_id: ApiCredential,
    endpoint: String,
    results: u8,
    client: reqwest::Client,
}

impl std::fmt::Debug for WebSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearch")
            .field("api_key", &self.api_key)
            .field("engine_id", &self.engine_id)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: String,
    link: Option<String>,
    #[serde(default)]
    snippet: String,
}

impl From<SearchItem> for SearchHit {
    fn from(item: SearchItem) -> Self {
        SearchHit {
            title: item.title,
            url: item.link,
            snippet: item.snippet,
        }
    }
}

impl WebSearch {
    /// Build from JSON config (`api_key`, `engine_id`, `endpoint`, `results`)
    /// with environment fallback for both credentials.
    pub fn from_config(config: &JsonValue) -> Result<Self, LookupError> {
        let mut creds = CredentialBuilder::new()
            .require("api_key", SEARCH_API_KEY_ENV, "Search API key")
            .require("engine_id", SEARCH_ENGINE_ID_ENV, "Search engine id")
            .build(config)
            .map_err(|e| LookupError::NotConfigured(e.0))?;

        let api_key = creds
            .take("api_key")
            .map_err(|e| LookupError::NotConfigured(e.0))?;
        let engine_id = creds
            .take("engine_id")
            .map_err(|e| LookupError::NotConfigured(e.0))?;

        Ok(Self {
            api_key,
            engine_id,
            endpoint: config["endpoint"]
                .as_str()
                .unwrap_or(DEFAULT_ENDPOINT)
                .to_string(),
            results: config["results"]
                .as_u64()
                .map(|n| n.clamp(1, 10) as u8)
                .unwrap_or(5),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        })
    }

    pub fn from_env() -> Result<Self, LookupError> {
        Self::from_config(&serde_json::json!({}))
    }
}

#[async_trait]
impl KnowledgeSource for WebSearch {
    async fn lookup(&self, query: &str) -> Result<Vec<SearchHit>, LookupError> {
        let num = self.results.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.expose()),
                ("cx", self.engine_id.expose()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LookupError::Timeout(Duration::from_secs(30))
                } else {
                    LookupError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if status == 429 {
            return Err(LookupError::RateLimited);
        }
        if status.is_server_error() {
            return Err(LookupError::Http(format!("server error {}", status.as_u16())));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LookupError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(e.to_string()))?;

        Ok(body.items.into_iter().map(SearchHit::from).collect())
    }

    fn name(&self) -> &str {
        "web"
    }
}
