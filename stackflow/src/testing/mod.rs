//! Testing utilities for stackflow.
//!
//! This module provides:
//! - An in-memory cloud provider
//! - Scripted source, build and deploy collaborators
//! - Fleet and pipeline fixtures

mod fixtures;
mod mocks;

pub use fixtures::{canonical_pipeline, TestFleet, TestPipeline, SELECTED_TAGS};
pub use mocks::{
    InMemoryCloudProvider, ScriptedBuildEnvironment, ScriptedDeployAgent, ScriptedSourceProvider,
};
