//! Runtime configuration for the audit pipeline.
//!
//! Loaded from YAML or JSON. Every section is optional; missing fields take
//! the defaults below. Durations are human-readable strings ("30s", "250ms").
//!
//! ```yaml
//! provider:
//!   name: gemini
//!   options:
//!     grounding: false
//! critic:
//!   model: gemini-2.5-flash
//!   timeout: 60s
//! reviser:
//!   timeout: 30s
//! lookup:
//!   timeout: 10s
//!   max_retries: 2
//! knowledge:
//!   source: frozen
//!   facts: facts.yaml
//! cache:
//!   enabled: true
//!   ttl: 1h
//! max_concurrent_runs: 4
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use auditor_core::Stage;

use crate::providers::CompletionConfig;
use crate::resilience::CircuitBreakerConfig;

/// Configuration failures, at load time or when validating the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingVariables(Vec<&'static str>),
}

/// Serde adapter for `Duration` as a humantime string.
pub(crate) mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub provider: ProviderConfig,
    pub critic: StageConfig,
    pub reviser: StageConfig,
    pub lookup: LookupPolicy,
    pub knowledge: KnowledgeConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub budgets: BudgetConfig,
    pub cache: CacheConfig,

    /// Upper bound on runs executing at once in a batch
    pub max_concurrent_runs: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            critic: StageConfig::critic(),
            reviser: StageConfig::reviser(),
            lookup: LookupPolicy::default(),
            knowledge: KnowledgeConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            budgets: BudgetConfig::default(),
            cache: CacheConfig::default(),
            max_concurrent_runs: 4,
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; `.json` is parsed as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn stage(&self, stage: Stage) -> &StageConfig {
        match stage {
            Stage::Critic => &self.critic,
            Stage::Reviser => &self.reviser,
        }
    }

    pub fn stage_timeout(&self, stage: Stage) -> Duration {
        self.stage(stage).timeout
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_runs == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_runs must be at least 1".to_string(),
            ));
        }

        for stage in Stage::ORDER {
            let cfg = self.stage(stage);
            if cfg.model.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} model is empty", stage)));
            }
            if cfg.timeout.is_zero() {
                return Err(ConfigError::Invalid(format!("{} timeout must be positive", stage)));
            }
            if cfg.max_tokens == 0 {
                return Err(ConfigError::Invalid(format!("{} max_tokens must be positive", stage)));
            }
        }

        if self.lookup.timeout.is_zero() {
            return Err(ConfigError::Invalid("lookup timeout must be positive".to_string()));
        }
        if self.lookup.min_delay > self.lookup.max_delay {
            return Err(ConfigError::Invalid(
                "lookup min_delay exceeds max_delay".to_string(),
            ));
        }

        if self.knowledge.source == KnowledgeKind::Frozen && self.knowledge.facts.is_none() {
            return Err(ConfigError::Invalid(
                "frozen knowledge requires a facts file".to_string(),
            ));
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache max_entries must be positive when the cache is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

/// Which model backend to build from the provider registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Registry key ("anthropic", "gemini")
    pub name: String,

    /// Provider-specific options passed to its factory
    pub options: JsonValue,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "gemini".to_string(),
            options: serde_json::json!({}),
        }
    }
}

/// Model settings for one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub model: String,

    pub max_tokens: u32,

    #[serde(default)]
    pub temperature: f32,

    /// Wall-clock limit for the whole stage, lookups included
    #[serde(with = "duration_str")]
    pub timeout: Duration,
}

impl StageConfig {
    pub fn critic() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            max_tokens: 2048,
            temperature: 0.0,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn reviser() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }
}

/// Retry and timeout policy for knowledge lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupPolicy {
    /// Limit for a single lookup attempt
    #[serde(with = "duration_str")]
    pub timeout: Duration,

    /// Retries after the first attempt, transient errors only
    pub max_retries: usize,

    #[serde(with = "duration_str")]
    pub min_delay: Duration,

    #[serde(with = "duration_str")]
    pub max_delay: Duration,

    /// Hits kept per lookup
    pub max_results: usize,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 2,
            min_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            max_results: 5,
        }
    }
}

/// Knowledge backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeKind {
    /// Google Programmable Search
    Web,
    /// Fact table loaded from `facts`
    Frozen,
    /// No lookup; every critique is best-effort
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub source: KnowledgeKind,
    pub facts: Option<PathBuf>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            source: KnowledgeKind::Web,
            facts: None,
        }
    }
}

/// Token budgets for the lifetime of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub global_max_tokens: u32,
    pub critic_max_tokens: u32,
    pub reviser_max_tokens: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            global_max_tokens: 1_000_000,
            critic_max_tokens: 600_000,
            reviser_max_tokens: 400_000,
        }
    }
}

impl BudgetConfig {
    pub fn stage_max(&self, stage: Stage) -> u32 {
        match stage {
            Stage::Critic => self.critic_max_tokens,
            Stage::Reviser => self.reviser_max_tokens,
        }
    }
}

/// Completed-run cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,
    #[serde(with = "duration_str")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stage_timeout(Stage::Critic), Duration::from_secs(60));
        assert_eq!(config.stage_timeout(Stage::Reviser), Duration::from_secs(30));
    }

    #[test]
    fn test_yaml_with_humantime_durations() {
        let yaml = r#"
critic:
  model: claude-sonnet-4-5
  max_tokens: 4096
  timeout: 90s
lookup:
  timeout: 500ms
  max_retries: 4
cache:
  enabled: false
max_concurrent_runs: 8
"#;
        let config = RuntimeConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.critic.model, "claude-sonnet-4-5");
        assert_eq!(config.critic.timeout, Duration::from_secs(90));
        assert_eq!(config.lookup.timeout, Duration::from_millis(500));
        assert_eq!(config.lookup.max_retries, 4);
        assert_eq!(config.lookup.max_delay, Duration::from_secs(2));
        assert!(!config.cache.enabled);
        assert_eq!(config.max_concurrent_runs, 8);
        // untouched sections keep defaults
        assert_eq!(config.reviser.timeout, Duration::from_secs(30));
        assert_eq!(config.provider.name, "gemini");
    }

    #[test]
    fn test_json_config() {
        let json = r#"{"provider": {"name": "anthropic", "options": {"base_url": "https://proxy"}},
                       "knowledge": {"source": "offline"}}"#;
        let config = RuntimeConfig::from_json(json).unwrap();
        assert_eq!(config.provider.name, "anthropic");
        assert_eq!(config.provider.options["base_url"], "https://proxy");
        assert_eq!(config.knowledge.source, KnowledgeKind::Offline);
    }

    #[test]
    fn test_bad_duration_rejected() {
        let result = RuntimeConfig::from_yaml("lookup:\n  timeout: soon\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = RuntimeConfig::default();
        config.max_concurrent_runs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = RuntimeConfig::default();
        config.knowledge.source = KnowledgeKind::Frozen;
        assert!(config.validate().is_err());
        config.knowledge.facts = Some(PathBuf::from("facts.yaml"));
        assert!(config.validate().is_ok());

        let mut config = RuntimeConfig::default();
        config.lookup.min_delay = Duration::from_secs(5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations_serialize_as_strings() {
        let yaml = serde_yaml::to_string(&RuntimeConfig::default()).unwrap();
        assert!(yaml.contains("timeout: 1m"));
        assert!(yaml.contains("min_delay: 200ms"));
        let back = RuntimeConfig::from_yaml(&yaml).unwrap();
        assert_eq!(back.lookup, LookupPolicy::default());
    }

    #[test]
    fn test_missing_variables_message() {
        let err = ConfigError::MissingVariables(vec!["PROJECT_ID", "AGENT_ENGINE_NAME"]);
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: PROJECT_ID, AGENT_ENGINE_NAME"
        );
    }

    #[test]
    fn test_completion_config_from_stage() {
        let cfg = StageConfig::reviser().completion_config();
        assert_eq!(cfg.max_tokens, 1024);
        assert_eq!(cfg.timeout, Duration::from_secs(30));
    }
}
