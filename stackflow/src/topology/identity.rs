//! Host identity (the role a host assumes).

use crate::errors::{DefinitionCode, DefinitionError};
use crate::utils::validate_resource_name;
use serde::{Deserialize, Serialize};

/// The identity a host runs as, with the managed capability bundles
/// granted to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostIdentity {
    /// Identity name.
    pub name: String,
    /// Service principal allowed to assume the identity.
    pub assumed_by: String,
    /// Managed policies attached, in attachment order.
    pub managed_policies: Vec<String>,
}

impl HostIdentity {
    /// Defines a host identity. Repeated policies are attached once.
    pub fn define(
        name: impl Into<String>,
        assumed_by: impl Into<String>,
        managed_policies: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        let assumed_by = assumed_by.into();
        validate_resource_name("identity", &name)?;

        if assumed_by.trim().is_empty() {
            return Err(DefinitionError::new(
                DefinitionCode::IDENTITY_INVALID,
                format!("Identity '{name}' has no principal"),
            )
            .with_resources([name]));
        }

        let mut policies: Vec<String> = Vec::new();
        for policy in managed_policies {
            let policy = policy.into();
            if policy.trim().is_empty() {
                return Err(DefinitionError::new(
                    DefinitionCode::IDENTITY_INVALID,
                    format!("Identity '{name}' lists an empty managed policy"),
                )
                .with_resources([name]));
            }
            if !policies.contains(&policy) {
                policies.push(policy);
            }
        }

        Ok(Self {
            name,
            assumed_by,
            managed_policies: policies,
        })
    }

    /// Returns true if the policy is attached.
    #[must_use]
    pub fn has_policy(&self, policy: &str) -> bool {
        self.managed_policies.iter().any(|p| p == policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define() {
        let identity = HostIdentity::define(
            "ec2Role",
            "ec2.amazonaws.com",
            [
                "AmazonSSMManagedInstanceCore",
                "service-role/AmazonEC2RoleforAWSCodeDeploy",
                "AmazonSSMManagedInstanceCore",
            ],
        )
        .unwrap();

        assert_eq!(identity.managed_policies.len(), 2);
        assert!(identity.has_policy("service-role/AmazonEC2RoleforAWSCodeDeploy"));
    }

    #[test]
    fn test_missing_principal() {
        let err = HostIdentity::define("role", " ", ["p"]).unwrap_err();
        assert_eq!(err.code, DefinitionCode::IDENTITY_INVALID);
    }

    #[test]
    fn test_empty_policy() {
        assert!(HostIdentity::define("role", "svc", [""]).is_err());
    }
}
