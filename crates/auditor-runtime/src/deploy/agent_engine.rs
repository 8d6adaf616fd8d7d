//! Vertex AI Agent Engine client.
//!
//! Updates an existing reasoning-engine resource in place. Packaging and
//! upload of staged artifacts happen outside this client; the request only
//! points the resource at the staging bucket.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{DeployError, DeploymentReceipt, DeploymentSpec, DeploymentTarget};
use crate::providers::ApiCredential;

/// Environment variable holding an OAuth access token for the Vertex AI API.
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_CLOUD_ACCESS_TOKEN";

const UPDATE_MASK: &str = "displayName,description,spec.agentFramework,spec.packageSpec";

pub struct AgentEngineClient {
    credential: ApiCredential,
    location: String,
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for AgentEngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentEngineClient")
            .field("credential", &self.credential)
            .field("location", &self.location)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl AgentEngineClient {
    pub fn new(credential: ApiCredential, location: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_default();

        Self {
            credential,
            location: location.into(),
            endpoint: None,
            client,
        }
    }

    /// Token from `GOOGLE_CLOUD_ACCESS_TOKEN`.
    pub fn from_env(location: impl Into<String>) -> Result<Self, DeployError> {
        let credential = ApiCredential::from_env(ACCESS_TOKEN_ENV, "Google Cloud access token")
            .map_err(|e| DeployError::NotConfigured(e.0))?;
        Ok(Self::new(credential, location))
    }

    /// Override the regional endpoint, e.g. for a local stub server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com/v1beta1", self.location),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReasoningEngine {
    display_name: String,
    description: String,
    spec: EngineSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EngineSpec {
    agent_framework: String,
    package_spec: PackageSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PackageSpec {
    pickle_object_gcs_uri: String,
    dependency_files_gcs_uri: String,
    requirements_gcs_uri: String,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: String,
}

fn engine_body(spec: &DeploymentSpec) -> ReasoningEngine {
    let staging = spec.staging_uri.trim_end_matches('/');
    ReasoningEngine {
        display_name: spec.definition.name.clone(),
        description: spec.definition.description.clone(),
        spec: EngineSpec {
            agent_framework: spec.agent_framework.clone(),
            package_spec: PackageSpec {
                pickle_object_gcs_uri: format!("{}/agent_engine/agent_engine.pkl", staging),
                dependency_files_gcs_uri: format!("{}/agent_engine/dependencies.tar.gz", staging),
                requirements_gcs_uri: format!("{}/agent_engine/requirements.txt", staging),
            },
        },
    }
}

#[async_trait]
impl DeploymentTarget for AgentEngineClient {
    async fn update(
        &self,
        resource_name: &str,
        spec: &DeploymentSpec,
    ) -> Result<DeploymentReceipt, DeployError> {
        let url = format!("{}/{}", self.base_url(), resource_name);
        debug!(url = %url, "Patching reasoning engine");

        let response = self
            .client
            .patch(&url)
            .query(&[("updateMask", UPDATE_MASK)])
            .bearer_auth(self.credential.expose())
            .json(&engine_body(spec))
            .send()
            .await
            .map_err(|e| DeployError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GoogleError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(DeployError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let operation: Operation = response
            .json()
            .await
            .map_err(|e| DeployError::Parse(e.to_string()))?;

        Ok(DeploymentReceipt {
            resource_name: resource_name.to_string(),
            operation: operation.name,
            submitted_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "agent_engine"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::DeployConfig;
    use crate::providers::CredentialSource;
    use auditor_core::PipelineDefinition;

    fn client() -> AgentEngineClient {
        AgentEngineClient::new(
            ApiCredential::new("token", CredentialSource::Programmatic, "test token"),
            "europe-west4",
        )
    }

    #[test]
    fn test_regional_endpoint() {
        assert_eq!(
            client().base_url(),
            "https://europe-west4-aiplatform.googleapis.com/v1beta1"
        );
        assert_eq!(
            client().with_endpoint("http://localhost:8080/").base_url(),
            "http://localhost:8080"
        );
    }

    #[test]
    fn test_body_points_at_staging_bucket() {
        let config = DeployConfig {
            project_id: "p".into(),
            location: "europe-west4".into(),
            staging_bucket: "bucket".into(),
            engine_name: "1".into(),
        };
        let spec = DeploymentSpec::new(PipelineDefinition::llm_auditor(), &config);
        let body = serde_json::to_value(engine_body(&spec)).unwrap();

        assert_eq!(body["displayName"], "llm_auditor");
        assert_eq!(body["spec"]["agentFramework"], "google-adk");
        assert_eq!(
            body["spec"]["packageSpec"]["requirementsGcsUri"],
            "gs://bucket/agent_engine/requirements.txt"
        );
        // package lists live in the staged artifacts, not the request
        let rendered = body.to_string();
        assert!(!rendered.contains("pydantic"));
        assert!(!rendered.contains("./auditor"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", client());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("\"token\""));
    }
}
