//! In-memory collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::Ipv4Addr;

use crate::actions::{BuildEnvironment, DeployAgent, SourceProvider};
use crate::core::{Artifact, PayloadHandle};
use crate::errors::{ActionFailure, ProviderError};
use crate::pipeline::{BuildProject, SourceRepository};
use crate::targeting::{DeploymentGroup, HostRecord};
use crate::topology::{
    AccessPolicy, CloudProvider, HostIdentity, HostPlacement, HostSpec, LaunchedHost, NetworkSpec,
};

/// A cloud provider that hands out sequential ids and addresses from
/// `198.51.100.0/24`.
#[derive(Debug, Default)]
pub struct InMemoryCloudProvider {
    next_id: Mutex<u32>,
    created: Mutex<Vec<(String, String)>>,
    fail_on: Mutex<Option<String>>,
}

impl InMemoryCloudProvider {
    /// Creates a provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call for `resource` fail. Resources are `identity`,
    /// `network`, `access_policy` and `host`.
    #[must_use]
    pub fn failing_on(self, resource: impl Into<String>) -> Self {
        *self.fail_on.lock() = Some(resource.into());
        self
    }

    /// Returns `(resource kind, id)` for every resource created, in order.
    #[must_use]
    pub fn created(&self) -> Vec<(String, String)> {
        self.created.lock().clone()
    }

    fn create(&self, resource: &str, prefix: &str) -> Result<String, ProviderError> {
        if self.fail_on.lock().as_deref() == Some(resource) {
            return Err(ProviderError::new(resource, "simulated provider failure"));
        }
        let mut next = self.next_id.lock();
        *next += 1;
        let id = format!("{prefix}-{:04}", *next);
        self.created.lock().push((resource.to_string(), id.clone()));
        Ok(id)
    }
}

#[async_trait]
impl CloudProvider for InMemoryCloudProvider {
    async fn create_identity(&self, _identity: &HostIdentity) -> Result<String, ProviderError> {
        self.create("identity", "role")
    }

    async fn create_network(&self, _network: &NetworkSpec) -> Result<String, ProviderError> {
        self.create("network", "vpc")
    }

    async fn create_access_policy(
        &self,
        _policy: &AccessPolicy,
        _network_id: &str,
    ) -> Result<String, ProviderError> {
        self.create("access_policy", "sg")
    }

    async fn launch_host(
        &self,
        _host: &HostSpec,
        _placement: &HostPlacement,
    ) -> Result<LaunchedHost, ProviderError> {
        let instance_id = self.create("host", "i")?;
        let octet = u8::try_from(*self.next_id.lock() % 250).unwrap_or(0) + 1;
        Ok(LaunchedHost {
            instance_id,
            public_ip: Ipv4Addr::new(198, 51, 100, octet),
        })
    }
}

/// A source provider that succeeds for every repository except the ones
/// told to fail.
#[derive(Debug, Default)]
pub struct ScriptedSourceProvider {
    failing: HashSet<String>,
    fetched: Mutex<Vec<String>>,
}

impl ScriptedSourceProvider {
    /// Creates a provider where every fetch succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes fetches of `repo` fail.
    #[must_use]
    pub fn failing(mut self, repo: impl Into<String>) -> Self {
        self.failing.insert(repo.into());
        self
    }

    /// Returns `owner/repo` for every fetch, in call order.
    #[must_use]
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl SourceProvider for ScriptedSourceProvider {
    async fn fetch(&self, repository: &SourceRepository) -> Result<PayloadHandle, ActionFailure> {
        self.fetched.lock().push(repository.full_name());
        if self.failing.contains(&repository.repo) {
            return Err(ActionFailure::new(format!(
                "cannot fetch {}@{}",
                repository.full_name(),
                repository.branch
            )));
        }
        let uri = format!("source://{}@{}", repository.full_name(), repository.branch);
        Ok(PayloadHandle::from_content(uri.clone(), uri.as_bytes()))
    }
}

/// A build environment that succeeds for every project except the ones
/// told to fail.
#[derive(Debug, Default)]
pub struct ScriptedBuildEnvironment {
    failing: HashSet<String>,
    built: Mutex<Vec<(String, String)>>,
}

impl ScriptedBuildEnvironment {
    /// Creates an environment where every build succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes builds of `project` fail.
    #[must_use]
    pub fn failing(mut self, project: impl Into<String>) -> Self {
        self.failing.insert(project.into());
        self
    }

    /// Returns `(project, input artifact)` for every build, in call order.
    #[must_use]
    pub fn built(&self) -> Vec<(String, String)> {
        self.built.lock().clone()
    }
}

#[async_trait]
impl BuildEnvironment for ScriptedBuildEnvironment {
    async fn build(
        &self,
        project: &BuildProject,
        input: &Artifact,
    ) -> Result<PayloadHandle, ActionFailure> {
        self.built
            .lock()
            .push((project.name.clone(), input.name.to_string()));
        if self.failing.contains(&project.name) {
            return Err(ActionFailure::new(format!(
                "build of {} exited with status 1",
                project.build_spec
            )));
        }
        Ok(PayloadHandle::new(format!("build://{}/{}", project.name, input.name)))
    }
}

/// A deploy agent that succeeds on every host except the ones told to
/// fail, and remembers what each host received.
#[derive(Debug, Default)]
pub struct ScriptedDeployAgent {
    failing: HashSet<String>,
    deployed: Mutex<Vec<(String, String)>>,
}

impl ScriptedDeployAgent {
    /// Creates an agent where every deployment succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes deployments to `host` fail.
    #[must_use]
    pub fn failing(mut self, host: impl Into<String>) -> Self {
        self.failing.insert(host.into());
        self
    }

    /// Returns `(host, artifact)` for every successful deployment, ordered
    /// by host id.
    #[must_use]
    pub fn deployed(&self) -> Vec<(String, String)> {
        let mut deployed = self.deployed.lock().clone();
        deployed.sort();
        deployed
    }

    /// Returns the ids of hosts that received an artifact, sorted.
    #[must_use]
    pub fn updated_hosts(&self) -> Vec<String> {
        self.deployed().into_iter().map(|(host, _)| host).collect()
    }
}

#[async_trait]
impl DeployAgent for ScriptedDeployAgent {
    async fn deploy(
        &self,
        group: &DeploymentGroup,
        host: &HostRecord,
        artifact: &Artifact,
    ) -> Result<(), ActionFailure> {
        if self.failing.contains(&host.id) {
            return Err(ActionFailure::new(format!(
                "{} agent on {} did not report success",
                group.application_name, host.id
            )));
        }
        self.deployed
            .lock()
            .push((host.id.clone(), artifact.name.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArtifactName, StageKind};
    use crate::targeting::{TagSelector, TagSet};

    #[test]
    fn test_in_memory_provider_ids() {
        let provider = InMemoryCloudProvider::new();
        let identity = HostIdentity::define("role", "ec2.amazonaws.com", ["p"]).unwrap();
        let id = tokio_test::block_on(provider.create_identity(&identity)).unwrap();
        assert_eq!(id, "role-0001");
        assert_eq!(provider.created(), vec![("identity".to_string(), "role-0001".to_string())]);
    }

    #[tokio::test]
    async fn test_in_memory_provider_failure() {
        let provider = InMemoryCloudProvider::new().failing_on("identity");
        let identity = HostIdentity::define("role", "ec2.amazonaws.com", ["p"]).unwrap();
        let err = provider.create_identity(&identity).await.unwrap_err();
        assert_eq!(err.resource, "identity");
        assert!(provider.created().is_empty());
    }

    #[tokio::test]
    async fn test_scripted_source() {
        let provider = ScriptedSourceProvider::new().failing("broken");
        let ok = SourceRepository::new("o", "fine", "main", "token");
        let bad = SourceRepository::new("o", "broken", "main", "token");

        let handle = provider.fetch(&ok).await.unwrap();
        assert_eq!(handle.uri, "source://o/fine@main");
        assert!(handle.digest.is_some());
        assert!(provider.fetch(&bad).await.is_err());
        assert_eq!(provider.fetched(), vec!["o/fine", "o/broken"]);
    }

    #[tokio::test]
    async fn test_scripted_deploy_agent() {
        let agent = ScriptedDeployAgent::new().failing("i-2");
        let group = DeploymentGroup::define("app", "group", TagSelector::new()).unwrap();
        let artifact = Artifact::new(
            ArtifactName::new("Out"),
            PayloadHandle::new("build://x"),
            "Build",
            StageKind::Build,
        );

        agent
            .deploy(&group, &HostRecord::new("i-1", TagSet::new()), &artifact)
            .await
            .unwrap();
        let err = agent
            .deploy(&group, &HostRecord::new("i-2", TagSet::new()), &artifact)
            .await
            .unwrap_err();
        assert!(err.reason.contains("i-2"));
        assert_eq!(agent.updated_hosts(), vec!["i-1"]);
    }
}
