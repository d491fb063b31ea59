//! Test fixtures for pipeline testing.

use std::sync::Arc;

use super::{ScriptedBuildEnvironment, ScriptedDeployAgent, ScriptedSourceProvider};
use crate::config::PipelineConfig;
use crate::errors::DefinitionError;
use crate::events::CollectingEventSink;
use crate::pipeline::{PipelineDefinition, PipelineRunner};
use crate::stacks::DeliveryPipelineStack;
use crate::targeting::{HostRecord, HostRegistry, TagSet};

/// Tags selected by the default deployment group.
pub const SELECTED_TAGS: [(&str, &str); 2] = [("application-name", "python-chat"), ("stage", "prod")];

/// Plans the default delivery pipeline.
pub fn canonical_pipeline() -> Result<PipelineDefinition, DefinitionError> {
    DeliveryPipelineStack::plan(&PipelineConfig::default())
}

/// A host registry under construction.
#[derive(Debug, Default)]
pub struct TestFleet {
    registry: HostRegistry,
}

impl TestFleet {
    /// Creates an empty fleet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a host with the given tags.
    pub fn with_host(self, id: &str, tags: &[(&str, &str)]) -> Result<Self, DefinitionError> {
        self.registry
            .register(HostRecord::new(id, TagSet::from_pairs(tags.iter().copied())?));
        Ok(self)
    }

    /// Adds hosts the default deployment group selects.
    pub fn with_selected_hosts(mut self, ids: &[&str]) -> Result<Self, DefinitionError> {
        for id in ids {
            self = self.with_host(id, &SELECTED_TAGS)?;
        }
        Ok(self)
    }

    /// Finishes the fleet.
    #[must_use]
    pub fn build(self) -> Arc<HostRegistry> {
        Arc::new(self.registry)
    }
}

/// A runner wired to scripted collaborators, with handles kept for
/// inspection after a run.
#[derive(Debug)]
pub struct TestPipeline {
    /// Source collaborator.
    pub sources: Arc<ScriptedSourceProvider>,
    /// Build collaborator.
    pub builds: Arc<ScriptedBuildEnvironment>,
    /// Deploy collaborator.
    pub agent: Arc<ScriptedDeployAgent>,
    /// The fleet.
    pub registry: Arc<HostRegistry>,
    /// Every event the runner emitted.
    pub events: Arc<CollectingEventSink>,
}

impl TestPipeline {
    /// Wires the collaborators together.
    #[must_use]
    pub fn new(
        sources: ScriptedSourceProvider,
        builds: ScriptedBuildEnvironment,
        agent: ScriptedDeployAgent,
        registry: Arc<HostRegistry>,
    ) -> Self {
        Self {
            sources: Arc::new(sources),
            builds: Arc::new(builds),
            agent: Arc::new(agent),
            registry,
            events: Arc::new(CollectingEventSink::new()),
        }
    }

    /// Creates a runner for `definition`.
    #[must_use]
    pub fn runner(&self, definition: PipelineDefinition) -> PipelineRunner {
        PipelineRunner::new(
            Arc::new(definition),
            self.sources.clone(),
            self.builds.clone(),
            self.agent.clone(),
            Arc::clone(&self.registry),
        )
        .with_event_sink(self.events.clone())
    }
}
