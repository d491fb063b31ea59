//! The delivery pipeline.

use crate::config::PipelineConfig;
use crate::core::StageKind;
use crate::errors::DefinitionError;
use crate::pipeline::{ActionSpec, BuildProject, PipelineBuilder, PipelineDefinition, SourceRepository};
use crate::targeting::{DeploymentGroup, TagSelector};
use crate::utils::validate_resource_name;
use tracing::info;

/// Source → Build → Deploy, fed by the configured repositories.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryPipelineStack;

impl DeliveryPipelineStack {
    /// Plans the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] if the wiring is invalid.
    pub fn plan(config: &PipelineConfig) -> Result<PipelineDefinition, DefinitionError> {
        validate_resource_name("stack", &config.stack_id)?;

        let sources = config.sources.iter().map(|source| {
            ActionSpec::source(
                &source.action_name,
                SourceRepository::new(
                    &source.owner,
                    &source.repo,
                    &source.branch,
                    &source.oauth_secret,
                ),
                source.output.as_str(),
            )
        });

        let builds = config.builds.iter().map(|build| {
            ActionSpec::build(
                &build.action_name,
                BuildProject::new(&build.project_name, &build.build_spec, &build.image)
                    .privileged(build.privileged),
                build.input.as_str(),
                build.output.as_str(),
            )
        });

        let deploy = &config.deploy;
        let selector: TagSelector = deploy
            .selector
            .iter()
            .map(|(key, values)| (key.clone(), values.clone()))
            .collect();
        let group = DeploymentGroup::define(&deploy.application_name, &deploy.group_name, selector)?
            .with_install_agent(deploy.install_agent);

        let mut builder = PipelineBuilder::new(&config.pipeline_name)
            .cross_account_keys(config.cross_account_keys)
            .stage(StageKind::Source, sources)?;
        // An empty build list means the deploy consumes a source artifact.
        if !config.builds.is_empty() {
            builder = builder.stage(StageKind::Build, builds)?;
        }
        let pipeline = builder
            .stage(
                StageKind::Deploy,
                [ActionSpec::deploy(&deploy.action_name, group, deploy.input.as_str())],
            )?
            .build()?;

        info!(
            stack = %config.stack_id,
            pipeline = %pipeline.name(),
            actions = pipeline.actions().count(),
            "Planned pipeline"
        );
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DefinitionCode;
    use crate::pipeline::ActionTarget;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plan_default_pipeline() {
        let pipeline = DeliveryPipelineStack::plan(&PipelineConfig::default()).unwrap();

        assert_eq!(pipeline.name(), "python-chatApp");
        assert!(!pipeline.cross_account_keys());
        let names: Vec<&str> = pipeline.actions().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "ChatServiceInfra_Source",
                "ChatService_Source",
                "CDK_Build",
                "ChatApp_Build",
                "ChatApp_Deploy",
            ]
        );

        let deploy = pipeline.action("ChatApp_Deploy").unwrap();
        assert_eq!(deploy.inputs[0].as_str(), "ChatServiceBuildOutput");
        let group = deploy.deployment_group().unwrap();
        assert_eq!(group.group_name, "PythonAppDeploymentGroup");
        assert!(group.install_agent);
        assert_eq!(group.selector.len(), 2);

        match &pipeline.action("ChatApp_Build").unwrap().target {
            ActionTarget::BuildProject(project) => {
                assert!(project.privileged);
                assert_eq!(project.build_spec, "build-specs/chat-app-build-spec.yml");
            }
            other => panic!("unexpected target {other:?}"),
        }
    }

    #[test]
    fn test_cross_account_keys_carried_into_definition() {
        let config = PipelineConfig {
            cross_account_keys: true,
            ..PipelineConfig::default()
        };
        let pipeline = DeliveryPipelineStack::plan(&config).unwrap();

        assert!(pipeline.cross_account_keys());
        assert_eq!(pipeline.to_json().unwrap()["cross_account_keys"], true);
    }

    #[test]
    fn test_deploy_of_unbuilt_artifact_rejected() {
        let mut config = PipelineConfig::default();
        config.deploy.input = "Nothing".to_string();
        let err = DeliveryPipelineStack::plan(&config).unwrap_err();
        assert_eq!(err.code, DefinitionCode::PIPELINE_UNKNOWN_ARTIFACT);
    }

    #[test]
    fn test_build_reading_sibling_output_rejected() {
        let mut config = PipelineConfig::default();
        config.builds[1].input = "CdkBuildOutput".to_string();
        let err = DeliveryPipelineStack::plan(&config).unwrap_err();
        assert_eq!(err.code, DefinitionCode::PIPELINE_FORWARD_REFERENCE);
    }

    #[test]
    fn test_without_build_stage() {
        let mut config = PipelineConfig::default();
        config.builds.clear();
        config.deploy.input = "ChatServiceSourceOutput".to_string();
        let pipeline = DeliveryPipelineStack::plan(&config).unwrap();
        assert_eq!(pipeline.stages().len(), 2);
    }
}
