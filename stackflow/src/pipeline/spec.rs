//! Pipeline definition types.

use crate::core::{ActionKind, ArtifactName, StageKind};
use crate::targeting::DeploymentGroup;
use serde::{Deserialize, Serialize};

/// A branch of a hosted repository, fetched by a source action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRepository {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Branch to fetch.
    pub branch: String,
    /// Name of the secret holding the access token. Only the name is kept.
    pub oauth_secret: String,
}

impl SourceRepository {
    /// Creates a repository reference.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        oauth_secret: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
            oauth_secret: oauth_secret.into(),
        }
    }

    /// Returns `owner/repo`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// A build project run by a build action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProject {
    /// Project name.
    pub name: String,
    /// Path of the build specification inside the source artifact.
    pub build_spec: String,
    /// Build image.
    pub image: String,
    /// Whether the build runs privileged (e.g. to build containers).
    #[serde(default)]
    pub privileged: bool,
}

impl BuildProject {
    /// Creates an unprivileged build project.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        build_spec: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            build_spec: build_spec.into(),
            image: image.into(),
            privileged: false,
        }
    }

    /// Sets privileged mode.
    #[must_use]
    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }
}

/// What an action operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionTarget {
    /// A source repository.
    Repository(SourceRepository),
    /// A build project.
    BuildProject(BuildProject),
    /// A deployment group.
    DeploymentGroup(DeploymentGroup),
}

/// A single unit of work inside a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Action name, unique within the pipeline.
    pub name: String,
    /// What the action does.
    pub kind: ActionKind,
    /// Artifacts consumed.
    #[serde(default)]
    pub inputs: Vec<ArtifactName>,
    /// Artifacts produced.
    #[serde(default)]
    pub outputs: Vec<ArtifactName>,
    /// What the action operates on.
    pub target: ActionTarget,
}

impl ActionSpec {
    /// A source action producing `output` from `repository`.
    #[must_use]
    pub fn source(
        name: impl Into<String>,
        repository: SourceRepository,
        output: impl Into<ArtifactName>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ActionKind::SourceFetch,
            inputs: Vec::new(),
            outputs: vec![output.into()],
            target: ActionTarget::Repository(repository),
        }
    }

    /// A build action turning `input` into `output` with `project`.
    #[must_use]
    pub fn build(
        name: impl Into<String>,
        project: BuildProject,
        input: impl Into<ArtifactName>,
        output: impl Into<ArtifactName>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ActionKind::Build,
            inputs: vec![input.into()],
            outputs: vec![output.into()],
            target: ActionTarget::BuildProject(project),
        }
    }

    /// A deploy action pushing `input` to every host in `group`.
    #[must_use]
    pub fn deploy(
        name: impl Into<String>,
        group: DeploymentGroup,
        input: impl Into<ArtifactName>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ActionKind::Deploy,
            inputs: vec![input.into()],
            outputs: Vec::new(),
            target: ActionTarget::DeploymentGroup(group),
        }
    }

    /// Returns the deployment group for deploy actions.
    #[must_use]
    pub fn deployment_group(&self) -> Option<&DeploymentGroup> {
        match &self.target {
            ActionTarget::DeploymentGroup(group) => Some(group),
            _ => None,
        }
    }
}

/// A stage and its actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    /// The stage.
    pub kind: StageKind,
    /// Actions run concurrently within the stage.
    pub actions: Vec<ActionSpec>,
}

impl StageSpec {
    /// Creates a stage.
    #[must_use]
    pub fn new(kind: StageKind, actions: Vec<ActionSpec>) -> Self {
        Self { kind, actions }
    }

    /// Returns the display name of the stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.stage_name()
    }
}

/// A validated pipeline. Build one with [`super::PipelineBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub(super) name: String,
    pub(super) stages: Vec<StageSpec>,
    #[serde(default)]
    pub(super) cross_account_keys: bool,
}

impl PipelineDefinition {
    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the artifact store is encrypted with keys other
    /// accounts can use.
    #[must_use]
    pub const fn cross_account_keys(&self) -> bool {
        self.cross_account_keys
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Returns the stage of the given kind, if present.
    #[must_use]
    pub fn stage(&self, kind: StageKind) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    /// Iterates over every action in execution order.
    pub fn actions(&self) -> impl Iterator<Item = &ActionSpec> {
        self.stages.iter().flat_map(|s| s.actions.iter())
    }

    /// Looks up an action by name.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions().find(|a| a.name == name)
    }

    /// Returns every deploy action.
    pub fn deploy_actions(&self) -> impl Iterator<Item = &ActionSpec> {
        self.actions().filter(|a| a.kind == ActionKind::Deploy)
    }

    /// Serializes the definition.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
