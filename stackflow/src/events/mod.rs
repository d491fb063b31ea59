//! Event sinks for pipeline observability.
//!
//! The pipeline runner reports its lifecycle through an [`EventSink`]. Event
//! types are dotted names; the ones the runner emits are listed in
//! [`event_types`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names emitted by the pipeline runner.
pub mod event_types {
    /// A run started.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A run reached `Succeeded`.
    pub const PIPELINE_SUCCEEDED: &str = "pipeline.succeeded";
    /// A run reached `Failed`.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
    /// A stage started.
    pub const STAGE_STARTED: &str = "stage.started";
    /// Every action in a stage succeeded.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// At least one action in a stage failed.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// An action succeeded.
    pub const ACTION_COMPLETED: &str = "action.completed";
    /// An action failed.
    pub const ACTION_FAILED: &str = "action.failed";
    /// A host received the artifact.
    pub const DEPLOY_HOST_UPDATED: &str = "deploy.host_updated";
    /// A host failed to receive the artifact.
    pub const DEPLOY_HOST_FAILED: &str = "deploy.host_failed";
    /// A deploy action matched no hosts.
    pub const DEPLOY_NO_TARGETS: &str = "deploy.no_targets";
}
