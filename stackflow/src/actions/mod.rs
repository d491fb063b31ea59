//! Collaborators that perform the actual work of pipeline actions.
//!
//! The runner only sequences actions and moves artifacts; fetching source,
//! running builds and pushing code onto a host are delegated to these
//! traits. Each call reports success or an [`ActionFailure`] and nothing in
//! between.

use crate::core::{Artifact, PayloadHandle};
use crate::errors::ActionFailure;
use crate::pipeline::{BuildProject, SourceRepository};
use crate::targeting::{DeploymentGroup, HostRecord};
use async_trait::async_trait;
use std::fmt::Debug;

/// Fetches a revision of a source repository.
#[async_trait]
pub trait SourceProvider: Send + Sync + Debug {
    /// Fetches the configured branch head and returns a handle to it.
    async fn fetch(&self, repository: &SourceRepository) -> Result<PayloadHandle, ActionFailure>;
}

/// Runs a build project over a source artifact.
#[async_trait]
pub trait BuildEnvironment: Send + Sync + Debug {
    /// Builds `input` with `project` and returns a handle to the output.
    async fn build(
        &self,
        project: &BuildProject,
        input: &Artifact,
    ) -> Result<PayloadHandle, ActionFailure>;
}

/// Pushes a build artifact onto a single host.
#[async_trait]
pub trait DeployAgent: Send + Sync + Debug {
    /// Deploys `artifact` to `host` on behalf of `group`.
    async fn deploy(
        &self,
        group: &DeploymentGroup,
        host: &HostRecord,
        artifact: &Artifact,
    ) -> Result<(), ActionFailure>;
}
