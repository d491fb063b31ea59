//! Stack configuration.
//!
//! Every identifier the two stacks use lives here instead of in code. All
//! fields have defaults matching the chat server deployment, so an empty
//! JSON object is a complete configuration. Values are only validated when
//! a stack is planned.

use crate::errors::StackflowError;
use crate::topology::MachineImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration for both stacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    /// The host topology.
    #[serde(default)]
    pub chat_server: ChatServerConfig,
    /// The delivery pipeline.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl StackConfig {
    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StackflowError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StackflowError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "Loaded stack configuration");
        Self::from_json_str(&content)
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or has fields of the wrong
    /// type.
    pub fn from_json_str(json: &str) -> Result<Self, StackflowError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Configuration of the chat server topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatServerConfig {
    /// Stack name.
    #[serde(default = "default_topology_stack_id")]
    pub stack_id: String,
    /// Network name.
    #[serde(default = "default_network_name")]
    pub network_name: String,
    /// Network address space.
    #[serde(default = "default_network_cidr")]
    pub network_cidr: String,
    /// Number of public segments.
    #[serde(default = "default_segment_count")]
    pub segment_count: usize,
    /// Prefix length of each segment.
    #[serde(default = "default_segment_mask")]
    pub segment_mask: u8,
    /// Segment name prefix; segments are numbered from `01`.
    #[serde(default = "default_segment_prefix")]
    pub segment_prefix: String,
    /// Zones to spread segments over. Empty leaves placement to the provider.
    #[serde(default)]
    pub availability_zones: Vec<String>,
    /// Access policy name.
    #[serde(default = "default_access_policy_name")]
    pub access_policy_name: String,
    /// Access policy description.
    #[serde(default = "default_access_policy_description")]
    pub access_policy_description: String,
    /// TCP ports open to any IPv4 address.
    #[serde(default = "default_ingress_ports")]
    pub ingress_ports: Vec<u16>,
    /// Identity name.
    #[serde(default = "default_identity_name")]
    pub identity_name: String,
    /// Principal allowed to assume the identity.
    #[serde(default = "default_assumed_by")]
    pub assumed_by: String,
    /// Managed policies attached to the identity.
    #[serde(default = "default_managed_policies")]
    pub managed_policies: Vec<String>,
    /// Host name.
    #[serde(default = "default_host_name")]
    pub host_name: String,
    /// Instance type, e.g. `t2.micro`.
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    /// Key pair for shell access.
    #[serde(default = "default_key_name")]
    pub key_name: Option<String>,
    /// Boot image.
    #[serde(default)]
    pub image: MachineImage,
    /// Bootstrap script, relative to the working directory.
    #[serde(default = "default_bootstrap_script")]
    pub bootstrap_script: PathBuf,
    /// Tags the deployment group selects the host by.
    #[serde(default = "default_host_tags")]
    pub host_tags: BTreeMap<String, String>,
}

fn default_topology_stack_id() -> String {
    "ChatServerStack".to_string()
}

fn default_network_name() -> String {
    "chat_server_vpc".to_string()
}

fn default_network_cidr() -> String {
    "10.0.0.0/16".to_string()
}

fn default_segment_count() -> usize {
    3
}

fn default_segment_mask() -> u8 {
    24
}

fn default_segment_prefix() -> String {
    "public".to_string()
}

fn default_access_policy_name() -> String {
    "web_sg".to_string()
}

fn default_access_policy_description() -> String {
    "Allows Inbound HTTP traffic to the web server.".to_string()
}

fn default_ingress_ports() -> Vec<u16> {
    vec![80, 22]
}

fn default_identity_name() -> String {
    "ec2Role".to_string()
}

fn default_assumed_by() -> String {
    "ec2.amazonaws.com".to_string()
}

fn default_managed_policies() -> Vec<String> {
    vec![
        "AmazonSSMManagedInstanceCore".to_string(),
        "service-role/AmazonEC2RoleforAWSCodeDeploy".to_string(),
    ]
}

fn default_host_name() -> String {
    "chat_server".to_string()
}

fn default_instance_type() -> String {
    "t2.micro".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_key_name() -> Option<String> {
    Some("chat_server".to_string())
}

fn default_bootstrap_script() -> PathBuf {
    PathBuf::from("./assets/configure_amz_linux_chat_app.sh")
}

fn default_host_tags() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("application-name".to_string(), "python-chat-server".to_string()),
        ("stage".to_string(), "prod".to_string()),
    ])
}

impl Default for ChatServerConfig {
    fn default() -> Self {
        Self {
            stack_id: default_topology_stack_id(),
            network_name: default_network_name(),
            network_cidr: default_network_cidr(),
            segment_count: default_segment_count(),
            segment_mask: default_segment_mask(),
            segment_prefix: default_segment_prefix(),
            availability_zones: Vec::new(),
            access_policy_name: default_access_policy_name(),
            access_policy_description: default_access_policy_description(),
            ingress_ports: default_ingress_ports(),
            identity_name: default_identity_name(),
            assumed_by: default_assumed_by(),
            managed_policies: default_managed_policies(),
            host_name: default_host_name(),
            instance_type: default_instance_type(),
            key_name: default_key_name(),
            image: MachineImage::default(),
            bootstrap_script: default_bootstrap_script(),
            host_tags: default_host_tags(),
        }
    }
}

/// A source action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Action name.
    pub action_name: String,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Branch to fetch.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Name of the secret holding the access token.
    #[serde(default = "default_oauth_secret")]
    pub oauth_secret: String,
    /// Output artifact name.
    pub output: String,
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_oauth_secret() -> String {
    "github-token".to_string()
}

/// A build action and its project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Action name.
    pub action_name: String,
    /// Build project name.
    pub project_name: String,
    /// Build specification path inside the source artifact.
    pub build_spec: String,
    /// Build image.
    #[serde(default = "default_build_image")]
    pub image: String,
    /// Privileged mode.
    #[serde(default)]
    pub privileged: bool,
    /// Input artifact name.
    pub input: String,
    /// Output artifact name.
    pub output: String,
}

fn default_build_image() -> String {
    "aws/codebuild/amazonlinux2-x86_64-standard:4.0".to_string()
}

/// The deploy action and its deployment group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Action name.
    #[serde(default = "default_deploy_action")]
    pub action_name: String,
    /// Deploy application name.
    #[serde(default = "default_application_name")]
    pub application_name: String,
    /// Deployment group name.
    #[serde(default = "default_group_name")]
    pub group_name: String,
    /// Tag key → allowed values.
    #[serde(default = "default_selector")]
    pub selector: BTreeMap<String, Vec<String>>,
    /// Install the deployment agent on targets.
    #[serde(default = "default_install_agent")]
    pub install_agent: bool,
    /// Artifact to deploy.
    #[serde(default = "default_deploy_input")]
    pub input: String,
}

fn default_deploy_action() -> String {
    "ChatApp_Deploy".to_string()
}

fn default_application_name() -> String {
    "python-chatApp".to_string()
}

fn default_group_name() -> String {
    "PythonAppDeploymentGroup".to_string()
}

fn default_selector() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        ("application-name".to_string(), vec!["python-chat".to_string()]),
        (
            "stage".to_string(),
            vec!["prod".to_string(), "stage".to_string()],
        ),
    ])
}

fn default_install_agent() -> bool {
    true
}

fn default_deploy_input() -> String {
    "ChatServiceBuildOutput".to_string()
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            action_name: default_deploy_action(),
            application_name: default_application_name(),
            group_name: default_group_name(),
            selector: default_selector(),
            install_agent: default_install_agent(),
            input: default_deploy_input(),
        }
    }
}

/// Configuration of the delivery pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stack name.
    #[serde(default = "default_pipeline_stack_id")]
    pub stack_id: String,
    /// Pipeline name.
    #[serde(default = "default_pipeline_name")]
    pub pipeline_name: String,
    /// Source actions.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    /// Build actions.
    #[serde(default = "default_builds")]
    pub builds: Vec<BuildConfig>,
    /// Deploy action.
    #[serde(default)]
    pub deploy: DeployConfig,
    /// Encrypt the artifact store with keys usable from other accounts.
    #[serde(default)]
    pub cross_account_keys: bool,
}

fn default_pipeline_stack_id() -> String {
    "ChatServerPipeline".to_string()
}

fn default_pipeline_name() -> String {
    "python-chatApp".to_string()
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            action_name: "ChatServiceInfra_Source".to_string(),
            owner: "IntegralD-503".to_string(),
            repo: "ChatServiceInfra".to_string(),
            branch: default_branch(),
            oauth_secret: default_oauth_secret(),
            output: "ChatServiceInfraSourceOutput".to_string(),
        },
        SourceConfig {
            action_name: "ChatService_Source".to_string(),
            owner: "IntegralD-503".to_string(),
            repo: "ChatService".to_string(),
            branch: default_branch(),
            oauth_secret: default_oauth_secret(),
            output: "ChatServiceSourceOutput".to_string(),
        },
    ]
}

fn default_builds() -> Vec<BuildConfig> {
    vec![
        BuildConfig {
            action_name: "CDK_Build".to_string(),
            project_name: "CdkBuildProject".to_string(),
            build_spec: "build-specs/cdk-build-spec.yml".to_string(),
            image: default_build_image(),
            privileged: false,
            input: "ChatServiceInfraSourceOutput".to_string(),
            output: "CdkBuildOutput".to_string(),
        },
        BuildConfig {
            action_name: "ChatApp_Build".to_string(),
            project_name: "ChatAppBuildProject".to_string(),
            build_spec: "build-specs/chat-app-build-spec.yml".to_string(),
            image: default_build_image(),
            privileged: true,
            input: "ChatServiceSourceOutput".to_string(),
            output: "ChatServiceBuildOutput".to_string(),
        },
    ]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stack_id: default_pipeline_stack_id(),
            pipeline_name: default_pipeline_name(),
            sources: default_sources(),
            builds: default_builds(),
            deploy: DeployConfig::default(),
            cross_account_keys: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_object_is_default() {
        let config = StackConfig::from_json_str("{}").unwrap();
        assert_eq!(config, StackConfig::default());
    }

    #[test]
    fn test_defaults() {
        let config = StackConfig::default();
        assert_eq!(config.chat_server.network_cidr, "10.0.0.0/16");
        assert_eq!(config.chat_server.segment_count, 3);
        assert_eq!(config.chat_server.ingress_ports, vec![80, 22]);
        assert_eq!(
            config.chat_server.host_tags.get("application-name").map(String::as_str),
            Some("python-chat-server")
        );
        assert_eq!(config.pipeline.pipeline_name, "python-chatApp");
        assert_eq!(config.pipeline.sources.len(), 2);
        assert!(config.pipeline.builds[1].privileged);
        assert_eq!(
            config.pipeline.deploy.selector["stage"],
            vec!["prod".to_string(), "stage".to_string()]
        );
    }

    #[test]
    fn test_partial_override() {
        let config = StackConfig::from_json_str(
            r#"{
                "chat_server": { "segment_count": 2, "key_name": null },
                "pipeline": { "deploy": { "selector": { "stage": ["prod"] } } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.chat_server.segment_count, 2);
        assert_eq!(config.chat_server.segment_mask, 24);
        assert_eq!(config.chat_server.key_name, None);
        assert_eq!(config.pipeline.deploy.selector.len(), 1);
        assert_eq!(config.pipeline.deploy.group_name, "PythonAppDeploymentGroup");
        assert_eq!(config.pipeline.builds.len(), 2);
        assert!(!config.pipeline.cross_account_keys);
    }

    #[test]
    fn test_cross_account_keys_override() {
        let config =
            StackConfig::from_json_str(r#"{"pipeline": {"cross_account_keys": true}}"#).unwrap();
        assert!(config.pipeline.cross_account_keys);
        assert_eq!(config.pipeline.pipeline_name, "python-chatApp");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"pipeline": {{"pipeline_name": "other"}}}}"#).unwrap();

        let config = StackConfig::load(file.path()).unwrap();
        assert_eq!(config.pipeline.pipeline_name, "other");
    }

    #[test]
    fn test_load_missing_file() {
        let err = StackConfig::load("/nonexistent/stackflow.json").unwrap_err();
        assert!(matches!(err, StackflowError::Config(_)));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let err = StackConfig::from_json_str(r#"{"chat_server": {"segment_mask": "wide"}}"#)
            .unwrap_err();
        assert!(matches!(err, StackflowError::Serialization(_)));
    }
}
