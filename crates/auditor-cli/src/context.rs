//! Settings shared by every command

use anyhow::{Context as _, Result};

use auditor_core::PipelineDefinition;
use auditor_runtime::config::KnowledgeKind;
use auditor_runtime::providers::ProviderRegistry;
use auditor_runtime::{AuditPipeline, AuditPipelineBuilder, RuntimeConfig};

use crate::cli::Cli;
use crate::output::OutputFormat;

pub struct Context {
    pub config: RuntimeConfig,
    pub definition: PipelineDefinition,
    pub format: OutputFormat,
}

impl Context {
    /// Load the config file, then apply command-line overrides.
    pub fn new(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => RuntimeConfig::from_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => RuntimeConfig::default(),
        };

        if let Some(provider) = &cli.provider {
            config.provider.name = provider.clone();
        }
        if let Some(model) = &cli.model {
            config.critic.model = model.clone();
            config.reviser.model = model.clone();
        }
        if let Some(facts) = &cli.facts {
            config.knowledge.source = KnowledgeKind::Frozen;
            config.knowledge.facts = Some(facts.clone());
        }
        config.validate()?;

        let definition = match &cli.definition {
            Some(path) => PipelineDefinition::from_yaml_file(path)
                .with_context(|| format!("loading pipeline definition from {}", path.display()))?,
            None => PipelineDefinition::llm_auditor(),
        };

        Ok(Self {
            config,
            definition,
            format: cli.format,
        })
    }

    /// Pipeline with the configured provider and knowledge source.
    pub fn pipeline(&self) -> Result<AuditPipeline> {
        let registry = ProviderRegistry::with_defaults();
        let pipeline = AuditPipelineBuilder::from_config(self.config.clone(), &registry)?
            .definition(self.definition.clone())
            .build()?;
        Ok(pipeline)
    }
}
