//! Deployment identifiers, read and validated before any I/O.

use serde::Serialize;

use crate::config::ConfigError;

pub const PROJECT_ID_ENV: &str = "PROJECT_ID";
pub const LOCATION_ENV: &str = "AGENT_ENGINE_LOCATION";
pub const STAGING_BUCKET_ENV: &str = "STAGING_BUCKET";
pub const ENGINE_NAME_ENV: &str = "AGENT_ENGINE_NAME";

/// Where and under what name the pipeline is deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployConfig {
    pub project_id: String,
    pub location: String,
    pub staging_bucket: String,
    pub engine_name: String,
}

impl DeployConfig {
    /// Read all four identifiers from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read all four identifiers through `lookup`.
    ///
    /// Unset and empty values are both missing. Every missing identifier is
    /// reported, not just the first.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut read = |key: &'static str| -> String {
            match lookup(key).map(|v| v.trim().to_string()) {
                Some(v) if !v.is_empty() => v,
                _ => {
                    missing.push(key);
                    String::new()
                }
            }
        };

        let project_id = read(PROJECT_ID_ENV);
        let location = read(LOCATION_ENV);
        let staging_bucket = read(STAGING_BUCKET_ENV);
        let engine_name = read(ENGINE_NAME_ENV);

        if !missing.is_empty() {
            return Err(ConfigError::MissingVariables(missing));
        }

        Ok(Self {
            project_id,
            location,
            staging_bucket,
            engine_name,
        })
    }

    /// Bucket as a `gs://` URI.
    pub fn staging_uri(&self) -> String {
        if self.staging_bucket.starts_with("gs://") {
            self.staging_bucket.clone()
        } else {
            format!("gs://{}", self.staging_bucket)
        }
    }

    /// Fully qualified reasoning-engine resource name.
    ///
    /// A name that is already qualified is used as given.
    pub fn resource_name(&self) -> String {
        if self.engine_name.starts_with("projects/") {
            self.engine_name.clone()
        } else {
            format!(
                "projects/{}/locations/{}/reasoningEngines/{}",
                self.project_id, self.location, self.engine_name
            )
        }
    }
}
