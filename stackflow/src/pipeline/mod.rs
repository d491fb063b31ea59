//! Pipeline definition and execution.
//!
//! This module provides:
//! - Pipeline definitions (stages, actions, targets)
//! - A builder that validates artifact wiring
//! - The execution state machine
//! - The runner and its reports

mod builder;
mod report;
mod runner;
mod spec;
mod state;


pub use builder::PipelineBuilder;
pub use report::{ActionReport, DeployReport, HostDeployment, HostOutcome, PipelineRun};
pub use runner::PipelineRunner;
pub use spec::{
    ActionSpec, ActionTarget, BuildProject, PipelineDefinition, SourceRepository, StageSpec,
};
pub use state::{Execution, ExecutionState};
