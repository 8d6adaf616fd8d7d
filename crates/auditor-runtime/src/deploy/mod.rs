//! Deployment of the pipeline definition to an agent-hosting runtime.
//!
//! Configuration is validated in full before any target is contacted. A
//! remote failure is logged and returned as-is; nothing here retries.

#[cfg(feature = "vertex")]
mod agent_engine;
mod config;
mod spec;

#[cfg(feature = "vertex")]
pub use agent_engine::AgentEngineClient;
pub use config::{DeployConfig, ENGINE_NAME_ENV, LOCATION_ENV, PROJECT_ID_ENV, STAGING_BUCKET_ENV};
pub use spec::{DeploymentSpec, AGENT_FRAMEWORK, DEFAULT_EXTRA_PACKAGES, DEFAULT_REQUIREMENTS};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use auditor_core::PipelineDefinition;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Deployment target not configured: {0}")]
    NotConfigured(String),
}

/// Acknowledgement from the deployment target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentReceipt {
    pub resource_name: String,
    /// Long-running operation name, when the target reports one.
    pub operation: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// A runtime that can host the pipeline.
#[async_trait]
pub trait DeploymentTarget: Send + Sync {
    /// Create-or-update the hosted pipeline named `resource_name`.
    async fn update(
        &self,
        resource_name: &str,
        spec: &DeploymentSpec,
    ) -> Result<DeploymentReceipt, DeployError>;

    fn name(&self) -> &str;
}

/// Validates the environment and pushes one definition to one target.
pub struct Deployer {
    target: Arc<dyn DeploymentTarget>,
    definition: PipelineDefinition,
}

impl Deployer {
    pub fn new(target: Arc<dyn DeploymentTarget>, definition: PipelineDefinition) -> Self {
        Self { target, definition }
    }

    /// Resolve configuration and build the spec without contacting the target.
    pub fn plan<F>(&self, lookup: F) -> Result<(DeployConfig, DeploymentSpec), DeployError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = DeployConfig::from_lookup(lookup)?;
        self.definition.validate().map_err(|e| {
            DeployError::Config(ConfigError::Invalid(format!("pipeline definition: {}", e)))
        })?;
        let spec = DeploymentSpec::new(self.definition.clone(), &config);
        Ok((config, spec))
    }

    /// Deploy using identifiers read through `lookup`.
    pub async fn run<F>(&self, lookup: F) -> Result<DeploymentReceipt, DeployError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (config, spec) = self.plan(lookup)?;

        info!(
            "Deploying to Project: {}, Agent Engine Location: {}, Bucket: {}",
            config.project_id, config.location, config.staging_bucket
        );

        let resource_name = config.resource_name();
        match self.target.update(&resource_name, &spec).await {
            Ok(receipt) => {
                info!(
                    target_name = self.target.name(),
                    resource = %receipt.resource_name,
                    "Deployment submitted"
                );
                Ok(receipt)
            }
            Err(e) => {
                error!("Deployment Failed: {}", e);
                Err(e)
            }
        }
    }

    /// Deploy using the process environment.
    pub async fn run_from_env(&self) -> Result<DeploymentReceipt, DeployError> {
        self.run(|key| std::env::var(key).ok()).await
    }
}
