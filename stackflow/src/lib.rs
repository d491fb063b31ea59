//! # Stackflow
//!
//! Declarative model of a single-host deployment topology and the
//! continuous-delivery pipeline that ships code onto it.
//!
//! Stackflow is split into two independently consumable parts:
//!
//! - **Topology**: an isolated network with public segments, an allow-list
//!   access policy, a host identity and one compute host that carries the
//!   tags the pipeline later uses to find it.
//! - **Pipeline**: a linear Source → Build → Deploy sequence of stages whose
//!   actions hand named, immutable artifacts forward. The deploy action never
//!   references a host directly; it selects hosts by matching tags.
//!
//! Both parts follow a plan/apply split. Planning is pure and produces
//! serializable descriptions; applying performs the side effects against
//! the external collaborators (`CloudProvider`, `SourceProvider`,
//! `BuildEnvironment`, `DeployAgent`).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stackflow::prelude::*;
//!
//! let config = StackConfig::default();
//! let topology = ChatServerStack::plan(&config.chat_server)?;
//! let pipeline = DeliveryPipelineStack::plan(&config.pipeline)?;
//!
//! let registry = Arc::new(HostRegistry::new());
//! let applied = topology.apply(&provider, &registry).await?;
//!
//! let runner = PipelineRunner::new(Arc::new(pipeline), sources, builds, agent, registry);
//! let run = runner.run("commit abc123").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod actions;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stacks;
pub mod targeting;
pub mod testing;
pub mod topology;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::actions::{BuildEnvironment, DeployAgent, SourceProvider};
    pub use crate::config::{ChatServerConfig, PipelineConfig, StackConfig};
    pub use crate::core::{
        ActionKind, ActionStatus, Artifact, ArtifactName, ArtifactStore, PayloadHandle, StageKind,
    };
    pub use crate::errors::{
        ActionFailure, ArtifactConflictError, DefinitionError, InvalidTransitionError,
        ProviderError, StackflowError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        ActionSpec, ActionTarget, BuildProject, ExecutionState, PipelineBuilder,
        PipelineDefinition, PipelineRun, PipelineRunner, SourceRepository, StageSpec,
    };
    pub use crate::stacks::{
        check_targeting, ChatServerStack, DeliveryPipelineStack, TargetingFinding,
    };
    pub use crate::targeting::{
        select_targets, DeploymentGroup, HostRecord, HostRegistry, TagSelector, TagSet,
    };
    pub use crate::topology::{
        AccessPolicy, AppliedTopology, CloudProvider, HostIdentity, HostSpec, Ipv4Cidr,
        NetworkSpec, StackOutputs, TopologyPlan,
    };
}
