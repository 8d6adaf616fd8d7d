//! Offline knowledge backends.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::{KnowledgeSource, LookupError, SearchHit};
use crate::config::ConfigError;

/// Fixed question-to-hits table.
///
/// Queries match after normalization (case, whitespace, trailing
/// punctuation). An unknown query returns no hits.
///
/// ```yaml
/// facts:
///   - query: What year did the Berlin Wall fall?
///     hits:
///       - title: Fall of the Berlin Wall
///         url: https://en.wikipedia.org/wiki/Fall_of_the_Berlin_Wall
///         snippet: The wall was opened on 9 November 1989.
/// ```
#[derive(Debug, Clone, Default)]
pub struct FrozenKnowledge {
    entries: BTreeMap<String, Vec<SearchHit>>,
}

#[derive(Deserialize)]
struct FactFile {
    #[serde(default)]
    facts: Vec<FactEntry>,
}

#[derive(Deserialize)]
struct FactEntry {
    query: String,
    #[serde(default)]
    hits: Vec<SearchHit>,
}

fn normalize(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(|c: char| c == '?' || c == '.' || c == '!')
        .to_lowercase()
}

impl FrozenKnowledge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, query: &str, hits: Vec<SearchHit>) {
        self.entries.entry(normalize(query)).or_default().extend(hits);
    }

    pub fn with_fact(mut self, query: &str, hit: SearchHit) -> Self {
        self.insert(query, vec![hit]);
        self
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: FactFile = serde_yaml::from_str(yaml)?;
        let mut knowledge = Self::new();
        for entry in file.facts {
            knowledge.insert(&entry.query, entry.hits);
        }
        Ok(knowledge)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KnowledgeSource for FrozenKnowledge {
    async fn lookup(&self, query: &str) -> Result<Vec<SearchHit>, LookupError> {
        Ok(self
            .entries
            .get(&normalize(query))
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "frozen"
    }
}

/// A source that is never reachable; every critique becomes best-effort.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineKnowledge;

#[async_trait]
impl KnowledgeSource for OfflineKnowledge {
    async fn lookup(&self, _query: &str) -> Result<Vec<SearchHit>, LookupError> {
        Err(LookupError::Unavailable(
            "no knowledge source configured".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "offline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACTS: &str = r#"
facts:
  - query: What year did the Berlin Wall fall?
    hits:
      - title: Fall of the Berlin Wall
        url: https://en.wikipedia.org/wiki/Fall_of_the_Berlin_Wall
        snippet: The wall was opened on 9 November 1989.
  - query: What is the boiling point of water at sea level?
    hits:
      - title: Boiling point
        snippet: Water boils at 100 °C at one standard atmosphere.
"#;

    #[tokio::test]
    async fn test_lookup_normalizes_query() {
        let knowledge = FrozenKnowledge::from_yaml(FACTS).unwrap();
        assert_eq!(knowledge.len(), 2);

        let hits = knowledge
            .lookup("  what year did the   Berlin Wall fall ")
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Fall of the Berlin Wall");
        assert!(hits[0].url.is_some());
    }

    #[tokio::test]
    async fn test_unknown_query_has_no_hits() {
        let knowledge = FrozenKnowledge::from_yaml(FACTS).unwrap();
        assert!(knowledge.lookup("Who painted the Mona Lisa?").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_builder_merges_hits() {
        let knowledge = FrozenKnowledge::new()
            .with_fact("Q?", SearchHit::new("a", "1"))
            .with_fact("q", SearchHit::new("b", "2"));
        assert_eq!(knowledge.lookup("Q").await.unwrap().len(), 2);
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(
            FrozenKnowledge::from_yaml("facts: [{hits: []}]"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_is_unavailable() {
        let result = OfflineKnowledge.lookup("anything").await;
        assert!(matches!(result, Err(LookupError::Unavailable(_))));
    }
}
