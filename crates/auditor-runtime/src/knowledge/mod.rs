//! External knowledge lookup used by the critic.
//!
//! Lookups are read-only and idempotent. Retrying transient failures is the
//! job of [`ResilientLookup`], never of the critic itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod frozen;
mod resilient;
#[cfg(feature = "web-search")]
mod web;

pub use frozen::{FrozenKnowledge, OfflineKnowledge};
pub use resilient::ResilientLookup;
#[cfg(feature = "web-search")]
pub use web::WebSearch;

/// Errors from a knowledge source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Knowledge source unavailable: {0}")]
    Unavailable(String),

    #[error("Lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("Lookup rate limited")]
    RateLimited,

    #[error("Lookup request failed: {0}")]
    Http(String),

    #[error("Lookup rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed lookup response: {0}")]
    Parse(String),

    #[error("Knowledge source not configured: {0}")]
    NotConfigured(String),
}

impl LookupError {
    /// Worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LookupError::Timeout(_) | LookupError::RateLimited | LookupError::Http(_)
        )
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub snippet: String,
}

impl SearchHit {
    pub fn new(title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: None,
            snippet: snippet.into(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// A read-only knowledge backend.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Search for `query`. No hits is `Ok(vec![])`, not an error.
    async fn lookup(&self, query: &str) -> Result<Vec<SearchHit>, LookupError>;

    /// Source name for logs and circuit breaker keys.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LookupError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(LookupError::RateLimited.is_transient());
        assert!(LookupError::Http("reset".into()).is_transient());
        assert!(!LookupError::Unavailable("offline".into()).is_transient());
        assert!(!LookupError::Rejected {
            status: 403,
            message: "forbidden".into()
        }
        .is_transient());
    }

    #[test]
    fn test_hit_yaml_without_url() {
        let hit: SearchHit = serde_yaml::from_str("title: T\nsnippet: S\n").unwrap();
        assert_eq!(hit, SearchHit::new("T", "S"));
    }
}
