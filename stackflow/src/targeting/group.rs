//! Deployment groups.

use super::TagSelector;
use crate::errors::DefinitionError;
use crate::utils::validate_resource_name;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A named set of hosts, resolved by tag selector at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentGroup {
    /// The deploy application this group belongs to.
    pub application_name: String,
    /// The group name.
    pub group_name: String,
    /// Which hosts belong to the group.
    pub selector: TagSelector,
    /// Whether the deployment agent is installed on hosts automatically.
    #[serde(default)]
    pub install_agent: bool,
}

impl DeploymentGroup {
    /// Defines a deployment group.
    ///
    /// An empty selector is accepted but logged, because it targets every
    /// registered host.
    pub fn define(
        application_name: impl Into<String>,
        group_name: impl Into<String>,
        selector: TagSelector,
    ) -> Result<Self, DefinitionError> {
        let application_name = application_name.into();
        let group_name = group_name.into();
        validate_resource_name("deploy application", &application_name)?;
        validate_resource_name("deployment group", &group_name)?;

        if selector.is_match_all() {
            warn!(
                group = %group_name,
                "Deployment group has an empty tag selector and will target every host"
            );
        }

        Ok(Self {
            application_name,
            group_name,
            selector,
            install_agent: false,
        })
    }

    /// Enables automatic agent installation.
    #[must_use]
    pub fn with_install_agent(mut self, install: bool) -> Self {
        self.install_agent = install;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define() {
        let group = DeploymentGroup::define(
            "python-chatApp",
            "PythonAppDeploymentGroup",
            TagSelector::new().with_key("stage", ["prod"]),
        )
        .unwrap()
        .with_install_agent(true);

        assert_eq!(group.group_name, "PythonAppDeploymentGroup");
        assert!(group.install_agent);
    }

    #[test]
    fn test_invalid_name_rejected() {
        assert!(DeploymentGroup::define("app", "bad name", TagSelector::new()).is_err());
    }

    #[test]
    fn test_empty_selector_allowed() {
        let group = DeploymentGroup::define("app", "everything", TagSelector::new()).unwrap();
        assert!(group.selector.is_match_all());
    }
}
