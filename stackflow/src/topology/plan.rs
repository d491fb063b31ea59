//! Topology plan and apply.

use super::{AccessPolicy, CloudProvider, HostIdentity, HostPlacement, HostSpec, NetworkSpec};
use crate::errors::StackflowError;
use crate::targeting::{HostRecord, HostRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, info_span, Instrument};

/// Output key under which the host's public address is published.
pub const PUBLIC_IP_OUTPUT: &str = "IP Address";

/// Plain key/value outputs published after apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackOutputs(BTreeMap<String, String>);

impl StackOutputs {
    /// Creates empty outputs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an output.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Reads an output.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates over outputs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no outputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The pure description of a topology: everything needed to provision it,
/// and nothing that required talking to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyPlan {
    /// Stack name.
    pub stack_name: String,
    /// The isolated network.
    pub network: NetworkSpec,
    /// The host's access policy.
    pub access_policy: AccessPolicy,
    /// The host's identity.
    pub identity: HostIdentity,
    /// The host.
    pub host: HostSpec,
}

/// The concrete result of applying a [`TopologyPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTopology {
    /// Stack name.
    pub stack_name: String,
    /// Provider id of the identity.
    pub identity_id: String,
    /// Provider id of the network.
    pub network_id: String,
    /// Provider id of the access policy.
    pub access_policy_id: String,
    /// The launched host as registered for targeting.
    pub host: HostRecord,
    /// Published outputs.
    pub outputs: StackOutputs,
}

impl TopologyPlan {
    /// Returns the names of every resource in the plan, in apply order.
    #[must_use]
    pub fn resource_names(&self) -> Vec<&str> {
        vec![
            self.identity.name.as_str(),
            self.network.name.as_str(),
            self.access_policy.name.as_str(),
            self.host.name.as_str(),
        ]
    }

    /// Provisions the plan and registers the launched host for targeting.
    ///
    /// Resources are created in dependency order: identity, network, access
    /// policy, host. A provider failure stops the apply; resources created
    /// before it are left for the provider to reconcile.
    pub async fn apply(
        &self,
        provider: &dyn CloudProvider,
        registry: &HostRegistry,
    ) -> Result<AppliedTopology, StackflowError> {
        let span = info_span!("apply_topology", stack = %self.stack_name);
        async {
            let identity_id = provider.create_identity(&self.identity).await?;
            info!(resource = %self.identity.name, id = %identity_id, "Created identity");

            let network_id = provider.create_network(&self.network).await?;
            info!(resource = %self.network.name, id = %network_id, subnets = self.network.subnets.len(), "Created network");

            let access_policy_id = provider
                .create_access_policy(&self.access_policy, &network_id)
                .await?;
            info!(resource = %self.access_policy.name, id = %access_policy_id, "Created access policy");

            let placement = HostPlacement {
                network_id: network_id.clone(),
                subnet: self.host.subnet.clone(),
                access_policy_id: access_policy_id.clone(),
                identity_id: identity_id.clone(),
            };
            let launched = provider.launch_host(&self.host, &placement).await?;
            info!(
                resource = %self.host.name,
                id = %launched.instance_id,
                public_ip = %launched.public_ip,
                "Launched host"
            );

            let host = HostRecord::new(launched.instance_id, self.host.tags.clone())
                .with_public_ip(launched.public_ip);
            registry.register(host.clone());

            let mut outputs = StackOutputs::new();
            outputs.insert(PUBLIC_IP_OUTPUT, launched.public_ip.to_string());

            Ok(AppliedTopology {
                stack_name: self.stack_name.clone(),
                identity_id,
                network_id,
                access_policy_id,
                host,
                outputs,
            })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::targeting::TagSet;
    use crate::topology::{
        BootstrapScript, IngressRule, InstanceType, Ipv4Cidr, LaunchedHost, MachineImage,
        MockCloudProvider,
    };

    fn plan() -> TopologyPlan {
        let cidr: Ipv4Cidr = "10.0.0.0/16".parse().unwrap();
        let network = NetworkSpec::public("chat_server_vpc", cidr, 3, 24, "public", &[]).unwrap();
        let access_policy =
            AccessPolicy::define("web_sg", "", [IngressRule::tcp_from_anywhere(80)]).unwrap();
        let identity = HostIdentity::define("ec2Role", "ec2.amazonaws.com", ["p"]).unwrap();
        let host = HostSpec {
            name: "chat_server".to_string(),
            instance_type: InstanceType::of("t2", "micro"),
            key_name: None,
            image: MachineImage::default(),
            network: network.name.clone(),
            subnet: "public01".to_string(),
            access_policy: access_policy.name.clone(),
            identity: identity.name.clone(),
            bootstrap: BootstrapScript::from_content("boot.sh", "echo boot"),
            tags: TagSet::from_pairs([("stage", "prod")]).unwrap(),
        };
        TopologyPlan {
            stack_name: "ChatServerStack".to_string(),
            network,
            access_policy,
            identity,
            host,
        }
    }

    #[tokio::test]
    async fn test_apply_publishes_ip_and_registers_host() {
        let mut provider = MockCloudProvider::new();
        provider
            .expect_create_identity()
            .times(1)
            .returning(|_| Ok("role-1".to_string()));
        provider
            .expect_create_network()
            .times(1)
            .returning(|_| Ok("vpc-1".to_string()));
        provider
            .expect_create_access_policy()
            .withf(|_, network_id| network_id.to_string() == "vpc-1")
            .times(1)
            .returning(|_, _| Ok("sg-1".to_string()));
        provider
            .expect_launch_host()
            .withf(|host, placement| {
                host.name == "chat_server"
                    && placement.access_policy_id == "sg-1"
                    && placement.identity_id == "role-1"
                    && placement.subnet == "public01"
            })
            .times(1)
            .returning(|_, _| {
                Ok(LaunchedHost {
                    instance_id: "i-123".to_string(),
                    public_ip: "198.51.100.10".parse().unwrap(),
                })
            });

        let registry = HostRegistry::new();
        let applied = plan().apply(&provider, &registry).await.unwrap();

        assert_eq!(applied.outputs.len(), 1);
        assert_eq!(applied.outputs.get(PUBLIC_IP_OUTPUT), Some("198.51.100.10"));
        assert_eq!(registry.get("i-123").unwrap().tags.get("stage"), Some("prod"));
    }

    #[tokio::test]
    async fn test_apply_stops_on_provider_error() {
        let mut provider = MockCloudProvider::new();
        provider
            .expect_create_identity()
            .returning(|_| Ok("role-1".to_string()));
        provider
            .expect_create_network()
            .returning(|_| Err(ProviderError::new("network", "quota exceeded")));
        provider.expect_create_access_policy().never();
        provider.expect_launch_host().never();

        let registry = HostRegistry::new();
        let err = plan().apply(&provider, &registry).await.unwrap_err();

        assert!(matches!(err, StackflowError::Provider(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resource_order() {
        let plan = plan();
        assert_eq!(
            plan.resource_names(),
            vec!["ec2Role", "chat_server_vpc", "web_sg", "chat_server"]
        );
    }

    #[test]
    fn test_plan_serializes() {
        let json = serde_json::to_value(plan()).unwrap();
        assert_eq!(json["network"]["subnets"][1]["cidr"], "10.0.1.0/24");
        assert_eq!(json["host"]["instance_type"], "t2.micro");
    }
}
