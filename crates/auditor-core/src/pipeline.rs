//! Pipeline definition: the ordered stage list handed to a hosting runtime.
//!
//! The definition is declarative. It names the pipeline and its two stages
//! and is what gets packaged for deployment. Validation enforces the only
//! shape the auditor supports: a critic followed by a reviser.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::Stage;

/// Errors that can occur when loading a pipeline definition.
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("Failed to read definition file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid stage order: expected critic then reviser, got [{0}]")]
    InvalidOrder(String),

    #[error("Duplicate stage name: {0}")]
    DuplicateStage(String),
}

/// One stage in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageSpec {
    /// Unique stage name (e.g., "critic_agent")
    pub name: String,

    /// What the stage does, shown to the hosting runtime
    pub description: String,

    /// Which role the stage plays
    pub kind: Stage,
}

/// A sequential pipeline definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineDefinition {
    /// Pipeline name (e.g., "llm_auditor")
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Stages in execution order
    pub stages: Vec<StageSpec>,
}

impl PipelineDefinition {
    /// The stock critic-then-reviser auditor.
    pub fn llm_auditor() -> Self {
        Self {
            name: "llm_auditor".to_string(),
            description: "Evaluates LLM-generated answers, verifies actual accuracy using the \
                          web, and refines the response to ensure alignment with real-world \
                          knowledge."
                .to_string(),
            stages: vec![
                StageSpec {
                    name: "critic_agent".to_string(),
                    description: "Identifies the claims in an answer and verifies each one \
                                  against external knowledge."
                        .to_string(),
                    kind: Stage::Critic,
                },
                StageSpec {
                    name: "reviser_agent".to_string(),
                    description: "Rewrites the answer so every flagged claim is corrected \
                                  and everything else is preserved."
                        .to_string(),
                    kind: Stage::Reviser,
                },
            ],
        }
    }

    /// Parse a definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, DefinitionError> {
        let definition: PipelineDefinition = serde_yaml::from_str(yaml)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Parse a definition from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, DefinitionError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the definition structure.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::MissingField("name".to_string()));
        }

        let kinds: Vec<Stage> = self.stages.iter().map(|s| s.kind).collect();
        if kinds != Stage::ORDER {
            return Err(DefinitionError::InvalidOrder(
                kinds
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for (i, stage) in self.stages.iter().enumerate() {
            if stage.name.trim().is_empty() {
                return Err(DefinitionError::MissingField(format!("stages[{}].name", i)));
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(DefinitionError::DuplicateStage(stage.name.clone()));
            }
        }

        Ok(())
    }

    /// Spec for a given stage.
    pub fn stage(&self, kind: Stage) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.kind == kind)
    }
}

impl Default for PipelineDefinition {
    fn default() -> Self {
        Self::llm_auditor()
    }
}
