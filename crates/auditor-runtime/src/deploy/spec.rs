//! What gets deployed.

use serde::{Deserialize, Serialize};

use auditor_core::PipelineDefinition;

use super::DeployConfig;

/// Agent framework the hosting runtime loads the pipeline with.
pub const AGENT_FRAMEWORK: &str = "google-adk";

/// Packages the hosting runtime installs before loading the pipeline.
pub const DEFAULT_REQUIREMENTS: &[&str] = &[
    "google-cloud-aiplatform[adk,agent_engines]==1.132.0",
    "pydantic==2.12.5",
    "cloudpickle==3.1.2",
];

/// Local packages uploaded alongside the pipeline.
pub const DEFAULT_EXTRA_PACKAGES: &[&str] = &["./auditor"];

/// Everything the deployment target needs for a create-or-update call.
///
/// `requirements` and `extra_packages` describe the artifacts expected
/// under `staging_uri`; they are shown by the dry-run plan but never sent.
/// The update request only points the engine at the staged files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub definition: PipelineDefinition,
    pub requirements: Vec<String>,
    pub staging_uri: String,
    pub agent_framework: String,
    pub extra_packages: Vec<String>,
}

impl DeploymentSpec {
    /// Spec for `definition` staged in the bucket from `config`.
    pub fn new(definition: PipelineDefinition, config: &DeployConfig) -> Self {
        Self {
            definition,
            requirements: DEFAULT_REQUIREMENTS.iter().map(|s| s.to_string()).collect(),
            staging_uri: config.staging_uri(),
            agent_framework: AGENT_FRAMEWORK.to_string(),
            extra_packages: DEFAULT_EXTRA_PACKAGES.iter().map(|s| s.to_string()).collect(),
        }
    }
}
