//! Pipeline builder with validation.

use super::{ActionSpec, ActionTarget, PipelineDefinition, StageSpec};
use crate::core::{ActionKind, ArtifactName, StageKind};
use crate::errors::{DefinitionCode, DefinitionError};
use crate::utils::validate_resource_name;
use std::collections::{BTreeMap, BTreeSet};

/// Builder for creating validated pipelines.
///
/// Every stage is checked as it is added, so a builder that exists is
/// always a valid prefix of a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageSpec>,
    /// Artifact name → stage that produces it.
    produced: BTreeMap<ArtifactName, StageKind>,
    action_names: BTreeSet<String>,
    cross_account_keys: bool,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            produced: BTreeMap::new(),
            action_names: BTreeSet::new(),
            cross_account_keys: false,
        }
    }

    /// Sets whether the artifact store uses cross-account keys.
    #[must_use]
    pub const fn cross_account_keys(mut self, enabled: bool) -> Self {
        self.cross_account_keys = enabled;
        self
    }

    /// Adds a stage to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is out of order, empty, holds an action
    /// of the wrong kind or wires an artifact that is not produced by a
    /// strictly earlier stage.
    pub fn stage(
        mut self,
        kind: StageKind,
        actions: impl IntoIterator<Item = ActionSpec>,
    ) -> Result<Self, DefinitionError> {
        self.add_stage_spec(StageSpec::new(kind, actions.into_iter().collect()))?;
        Ok(self)
    }

    /// Adds a stage with a specification.
    ///
    /// An input may name an artifact from any strictly earlier stage, not
    /// only the one directly before it. A deploy action can therefore ship
    /// a source artifact unchanged even when a build stage exists.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn add_stage_spec(&mut self, spec: StageSpec) -> Result<(), DefinitionError> {
        if let Some(last) = self.stages.last() {
            if spec.kind <= last.kind {
                return Err(DefinitionError::new(
                    DefinitionCode::PIPELINE_STAGE_ORDER,
                    format!("Stage '{}' cannot follow stage '{}'", spec.name(), last.name()),
                )
                .with_resources([last.name(), spec.name()]));
            }
        }

        if spec.actions.is_empty() {
            return Err(DefinitionError::new(
                DefinitionCode::PIPELINE_EMPTY_STAGE,
                format!("Stage '{}' has no actions", spec.name()),
            )
            .with_resources([spec.name()]));
        }

        let mut stage_outputs: BTreeSet<ArtifactName> = BTreeSet::new();
        let mut stage_action_names: BTreeSet<&str> = BTreeSet::new();

        for action in &spec.actions {
            validate_resource_name("action", &action.name)?;
            if action.kind.stage() != spec.kind {
                return Err(DefinitionError::new(
                    DefinitionCode::PIPELINE_ACTION_KIND,
                    format!(
                        "Action '{}' of kind '{}' cannot run in stage '{}'",
                        action.name,
                        action.kind,
                        spec.name()
                    ),
                )
                .with_resources([action.name.as_str(), spec.name()]));
            }
            if !target_matches_kind(action) {
                return Err(DefinitionError::new(
                    DefinitionCode::PIPELINE_ACTION_KIND,
                    format!(
                        "Action '{}' of kind '{}' has a target of another kind",
                        action.name, action.kind
                    ),
                )
                .with_resources([action.name.as_str()]));
            }
            check_arity(action)?;

            if self.action_names.contains(&action.name)
                || !stage_action_names.insert(action.name.as_str())
            {
                return Err(DefinitionError::new(
                    DefinitionCode::PIPELINE_DUPLICATE_ACTION,
                    format!("Action name '{}' is used more than once", action.name),
                )
                .with_resources([action.name.as_str()]));
            }

            for output in &action.outputs {
                validate_resource_name("artifact", output.as_str())?;
                if self.produced.contains_key(output) || !stage_outputs.insert(output.clone()) {
                    return Err(DefinitionError::new(
                        DefinitionCode::PIPELINE_DUPLICATE_ARTIFACT,
                        format!("Artifact '{output}' is produced more than once"),
                    )
                    .with_resources([action.name.as_str(), output.as_str()]));
                }
            }
        }

        // Inputs are checked once every output of the stage is known, so a
        // same-stage reference is reported as such regardless of action order.
        for action in &spec.actions {
            for input in &action.inputs {
                if stage_outputs.contains(input) {
                    return Err(DefinitionError::new(
                        DefinitionCode::PIPELINE_FORWARD_REFERENCE,
                        format!(
                            "Action '{}' consumes '{input}', which is produced in the same stage '{}'",
                            action.name,
                            spec.name()
                        ),
                    )
                    .with_resources([action.name.as_str(), input.as_str()]));
                }
                if !self.produced.contains_key(input) {
                    return Err(DefinitionError::new(
                        DefinitionCode::PIPELINE_UNKNOWN_ARTIFACT,
                        format!(
                            "Action '{}' consumes '{input}', which no earlier stage produces",
                            action.name
                        ),
                    )
                    .with_resources([action.name.as_str(), input.as_str()]));
                }
            }
        }

        for action in &spec.actions {
            self.action_names.insert(action.name.clone());
        }
        for output in stage_outputs {
            self.produced.insert(output, spec.kind);
        }
        self.stages.push(spec);
        Ok(())
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the builder has no stages.
    pub fn build(self) -> Result<PipelineDefinition, DefinitionError> {
        validate_resource_name("pipeline", &self.name)?;
        if self.stages.is_empty() {
            return Err(DefinitionError::new(
                DefinitionCode::PIPELINE_EMPTY,
                format!("Pipeline '{}' has no stages", self.name),
            )
            .with_resources([self.name.as_str()]));
        }

        Ok(PipelineDefinition {
            name: self.name,
            stages: self.stages,
            cross_account_keys: self.cross_account_keys,
        })
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

fn target_matches_kind(action: &ActionSpec) -> bool {
    matches!(
        (action.kind, &action.target),
        (ActionKind::SourceFetch, ActionTarget::Repository(_))
            | (ActionKind::Build, ActionTarget::BuildProject(_))
            | (ActionKind::Deploy, ActionTarget::DeploymentGroup(_))
    )
}

/// Checks input and output counts per kind. Which stage an input comes
/// from is checked by [`PipelineBuilder::add_stage_spec`].
fn check_arity(action: &ActionSpec) -> Result<(), DefinitionError> {
    let (inputs, outputs) = match action.kind {
        ActionKind::SourceFetch => (0, 1),
        ActionKind::Build => (1, 1),
        ActionKind::Deploy => (1, 0),
    };
    if action.inputs.len() == inputs && action.outputs.len() == outputs {
        return Ok(());
    }
    Err(DefinitionError::new(
        DefinitionCode::PIPELINE_ARITY,
        format!(
            "Action '{}' of kind '{}' must have {inputs} input(s) and {outputs} output(s), found {} and {}",
            action.name,
            action.kind,
            action.inputs.len(),
            action.outputs.len()
        ),
    )
    .with_resources([action.name.as_str()]))
}
