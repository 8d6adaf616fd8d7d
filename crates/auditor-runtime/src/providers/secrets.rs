//! API keys and access tokens.
//!
//! Model, search and deployment clients hold their secrets as
//! [`ApiCredential`], which prints `[REDACTED]` and only hands out the raw
//! value through [`ApiCredential::expose`].
//!
//! Resolution order is always: JSON config key, then environment variable.
//! An empty value counts as unset in both places.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A credential could not be loaded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CredentialError(pub String);

impl From<CredentialError> for super::ProviderError {
    fn from(e: CredentialError) -> Self {
        super::ProviderError::NotConfigured(e.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Config,
    Environment,
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CredentialSource::Config => "config",
            CredentialSource::Environment => "environment",
            CredentialSource::Programmatic => "programmatic",
        })
    }
}

pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Resolve `config_key` from `config`, then `env_var` through `lookup`.
    ///
    /// Pass `None` as `config_key` for environment-only credentials.
    pub fn resolve<F>(
        config: &JsonValue,
        config_key: Option<&str>,
        env_var: &str,
        name: &'static str,
        lookup: F,
    ) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_config = config_key
            .and_then(|key| config[key].as_str())
            .filter(|v| !v.is_empty());
        if let Some(value) = from_config {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }
        if let Some(value) = non_empty(lookup(env_var)) {
            return Ok(Self::new(value, CredentialSource::Environment, name));
        }

        Err(CredentialError(match config_key {
            Some(key) => format!(
                "{} required: set '{}' in config or {} environment variable",
                name, key, env_var
            ),
            None => format!("{} not set: configure '{}' environment variable", name, env_var),
        }))
    }

    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, CredentialError> {
        Self::resolve(&JsonValue::Null, None, env_var, name, env_lookup)
    }

    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, CredentialError> {
        Self::resolve(config, Some(config_key), env_var, name, env_lookup)
    }

    /// Whether [`from_config_or_env`](Self::from_config_or_env) would succeed.
    pub fn is_available(config: &JsonValue, config_key: &str, env_var: &str) -> bool {
        config[config_key].as_str().is_some_and(|v| !v.is_empty())
            || non_empty(env_lookup(env_var)).is_some()
    }

    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [REDACTED]", self.name, self.source)
    }
}

/// Loads several required credentials and reports every missing one at once.
///
/// ```ignore
/// let mut creds = CredentialBuilder::new()
///     .require("api_key", "GOOGLE_SEARCH_API_KEY", "Search API key")
///     .require("engine_id", "GOOGLE_SEARCH_ENGINE_ID", "Search engine id")
///     .build(&config)?;
/// let api_key = creds.take("api_key")?;
/// ```
#[derive(Default)]
pub struct CredentialBuilder {
    required: Vec<(&'static str, &'static str, &'static str)>,
}

impl CredentialBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, config_key: &'static str, env_var: &'static str, name: &'static str) -> Self {
        self.required.push((config_key, env_var, name));
        self
    }

    pub fn build(self, config: &JsonValue) -> Result<CredentialSet, CredentialError> {
        self.build_with(config, env_lookup)
    }

    fn build_with<F>(self, config: &JsonValue, lookup: F) -> Result<CredentialSet, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut credentials = BTreeMap::new();
        let mut missing = Vec::new();

        for (config_key, env_var, name) in self.required {
            match ApiCredential::resolve(config, Some(config_key), env_var, name, &lookup) {
                Ok(cred) => {
                    credentials.insert(config_key, cred);
                }
                Err(e) => missing.push(e.0),
            }
        }

        if missing.is_empty() {
            Ok(CredentialSet { credentials })
        } else {
            Err(CredentialError(missing.join("; ")))
        }
    }
}

/// Credentials loaded by a [`CredentialBuilder`].
pub struct CredentialSet {
    credentials: BTreeMap<&'static str, ApiCredential>,
}

impl CredentialSet {
    /// Move a credential out of the set.
    pub fn take(&mut self, key: &str) -> Result<ApiCredential, CredentialError> {
        self.credentials
            .remove(key)
            .ok_or_else(|| CredentialError(format!("Credential '{}' not loaded", key)))
    }

    pub fn has(&self, key: &str) -> bool {
        self.credentials.contains_key(key)
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.credentials.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_secret_never_printed() {
        let secret = "AIza-super-secret-key-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Config, "Gemini API key");

        let debug = format!("{:?}", cred);
        assert!(!debug.contains(secret));
        assert!(debug.contains("[REDACTED]"));

        let display = cred.to_string();
        assert!(!display.contains(secret));
        assert_eq!(display, "Gemini API key (config) [REDACTED]");
    }

    #[test]
    fn test_config_wins_over_environment() {
        let config = serde_json::json!({ "api_key": "config-key" });
        let cred = ApiCredential::resolve(
            &config,
            Some("api_key"),
            "GEMINI_API_KEY",
            "Gemini API key",
            vars(&[("GEMINI_API_KEY", "env-key")]),
        )
        .unwrap();

        assert_eq!(cred.expose(), "config-key");
        assert_eq!(cred.source(), CredentialSource::Config);
    }

    #[test]
    fn test_empty_config_value_falls_through_to_environment() {
        let config = serde_json::json!({ "api_key": "" });
        let cred = ApiCredential::resolve(
            &config,
            Some("api_key"),
            "GEMINI_API_KEY",
            "Gemini API key",
            vars(&[("GEMINI_API_KEY", "env-key")]),
        )
        .unwrap();

        assert_eq!(cred.expose(), "env-key");
        assert_eq!(cred.source(), CredentialSource::Environment);
    }

    #[test]
    fn test_empty_environment_counts_as_missing() {
        let err = ApiCredential::resolve(
            &JsonValue::Null,
            None,
            "GOOGLE_CLOUD_ACCESS_TOKEN",
            "Access token",
            vars(&[("GOOGLE_CLOUD_ACCESS_TOKEN", "")]),
        )
        .unwrap_err();
        assert!(err.0.contains("GOOGLE_CLOUD_ACCESS_TOKEN"));
    }

    #[test]
    fn test_builder_reports_every_missing_credential() {
        let err = CredentialBuilder::new()
            .require("api_key", "GOOGLE_SEARCH_API_KEY", "Search API key")
            .require("engine_id", "GOOGLE_SEARCH_ENGINE_ID", "Search engine id")
            .build_with(&serde_json::json!({}), vars(&[]))
            .unwrap_err();

        assert!(err.0.contains("GOOGLE_SEARCH_API_KEY"));
        assert!(err.0.contains("GOOGLE_SEARCH_ENGINE_ID"));
    }

    #[test]
    fn test_builder_mixes_config_and_environment() {
        let mut creds = CredentialBuilder::new()
            .require("api_key", "GOOGLE_SEARCH_API_KEY", "Search API key")
            .require("engine_id", "GOOGLE_SEARCH_ENGINE_ID", "Search engine id")
            .build_with(
                &serde_json::json!({ "engine_id": "cx-123" }),
                vars(&[("GOOGLE_SEARCH_API_KEY", "search-key")]),
            )
            .unwrap();

        let key = creds.take("api_key").unwrap();
        assert_eq!(key.source(), CredentialSource::Environment);
        assert_eq!(creds.take("engine_id").unwrap().expose(), "cx-123");
        assert!(!creds.has("engine_id"));
        assert!(creds.take("engine_id").is_err());
    }
}
