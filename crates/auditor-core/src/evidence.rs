//! Evidence gathered by the critic.
//!
//! Every retrieved fact is kept with a pointer back to where it came from
//! so a critique can be traced to its sources.

use serde::{Deserialize, Serialize};

/// Where a piece of evidence comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    /// Returned by the external knowledge lookup
    KnowledgeLookup,

    /// Cited by the critic model without a matching lookup result
    ModelCitation,
}

/// A retrieved fact supporting a critique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Short title of the source document
    pub title: String,

    /// Relevant excerpt
    pub snippet: String,

    pub source: EvidenceSource,

    /// Pointer to the origin (e.g., "lookup[0]" or a URL)
    pub pointer: String,
}

impl Evidence {
    /// Evidence from the n-th knowledge lookup hit.
    pub fn from_lookup(
        title: impl Into<String>,
        snippet: impl Into<String>,
        index: usize,
        url: Option<&str>,
    ) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            source: EvidenceSource::KnowledgeLookup,
            pointer: url
                .map(str::to_string)
                .unwrap_or_else(|| format!("lookup[{}]", index)),
        }
    }

    /// Evidence cited by the model.
    pub fn from_citation(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            title: url.clone(),
            snippet: String::new(),
            source: EvidenceSource::ModelCitation,
            pointer: url,
        }
    }
}

/// Builder for creating evidence with fluent API.
pub struct EvidenceBuilder {
    title: String,
    snippet: String,
    source: EvidenceSource,
    pointer: String,
}

impl EvidenceBuilder {
    /// Start building evidence with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            snippet: String::new(),
            source: EvidenceSource::KnowledgeLookup,
            pointer: String::new(),
        }
    }

    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn from_lookup(mut self, index: usize) -> Self {
        self.source = EvidenceSource::KnowledgeLookup;
        self.pointer = format!("lookup[{}]", index);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.pointer = url.into();
        self
    }

    pub fn build(self) -> Evidence {
        Evidence {
            title: self.title,
            snippet: self.snippet,
            source: self.source,
            pointer: self.pointer,
        }
    }
}
