//! The chat server topology.

use crate::config::ChatServerConfig;
use crate::errors::DefinitionError;
use crate::topology::{
    AccessPolicy, HostBuilder, HostIdentity, IngressRule, InstanceType, Ipv4Cidr, NetworkSpec,
    TopologyPlan,
};
use crate::utils::validate_resource_name;
use tracing::info;

/// One host in its own public network, reachable on the configured ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatServerStack;

impl ChatServerStack {
    /// Plans the topology.
    ///
    /// Pure apart from reading the bootstrap script, which happens here so
    /// that a missing file fails before any provider call.
    ///
    /// # Errors
    ///
    /// Returns the first [`DefinitionError`] raised by any resource.
    pub fn plan(config: &ChatServerConfig) -> Result<TopologyPlan, DefinitionError> {
        validate_resource_name("stack", &config.stack_id)?;

        let identity = HostIdentity::define(
            &config.identity_name,
            &config.assumed_by,
            &config.managed_policies,
        )?;

        let cidr: Ipv4Cidr = config.network_cidr.parse()?;
        let network = NetworkSpec::public(
            &config.network_name,
            cidr,
            config.segment_count,
            config.segment_mask,
            &config.segment_prefix,
            &config.availability_zones,
        )?;

        let access_policy = AccessPolicy::define(
            &config.access_policy_name,
            &config.access_policy_description,
            config
                .ingress_ports
                .iter()
                .map(|port| IngressRule::tcp_from_anywhere(*port)),
        )?;

        let instance_type: InstanceType = config.instance_type.parse()?;
        let mut host = HostBuilder::new(&config.host_name)
            .network(&network)
            .access_policy(&access_policy)
            .identity(&identity)
            .instance_type(instance_type)
            .image(config.image.clone())
            .bootstrap_script(&config.bootstrap_script);
        if let Some(key_name) = &config.key_name {
            host = host.key_name(key_name);
        }
        for (key, value) in &config.host_tags {
            host = host.tag(key, value);
        }
        let host = host.build()?;

        info!(
            stack = %config.stack_id,
            network = %network.cidr,
            subnets = network.subnets.len(),
            host = %host.name,
            "Planned topology"
        );

        Ok(TopologyPlan {
            stack_name: config.stack_id.clone(),
            network,
            access_policy,
            identity,
            host,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DefinitionCode;
    use crate::topology::{Protocol, SubnetType};
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::net::Ipv4Addr;

    fn config_with_script() -> (ChatServerConfig, tempfile::NamedTempFile) {
        let mut script = tempfile::NamedTempFile::new().unwrap();
        writeln!(script, "#!/bin/bash\nyum install -y python3").unwrap();
        let config = ChatServerConfig {
            bootstrap_script: script.path().to_path_buf(),
            ..ChatServerConfig::default()
        };
        (config, script)
    }

    #[test]
    fn test_plan_default_topology() {
        let (config, _script) = config_with_script();
        let plan = ChatServerStack::plan(&config).unwrap();

        let cidrs: Vec<String> = plan.network.subnets.iter().map(|s| s.cidr.to_string()).collect();
        assert_eq!(cidrs, vec!["10.0.0.0/24", "10.0.1.0/24", "10.0.2.0/24"]);
        assert!(plan
            .network
            .subnets
            .iter()
            .all(|s| s.subnet_type == SubnetType::Public));

        assert_eq!(plan.host.subnet, "public01");
        assert_eq!(plan.host.instance_type.to_string(), "t2.micro");
        assert_eq!(plan.host.key_name.as_deref(), Some("chat_server"));
        assert_eq!(plan.host.tags.get("application-name"), Some("python-chat-server"));
        assert_eq!(plan.host.tags.get("stage"), Some("prod"));
        assert!(plan.host.bootstrap.content.contains("python3"));

        assert!(plan.identity.has_policy("AmazonSSMManagedInstanceCore"));
        assert!(plan.identity.has_policy("service-role/AmazonEC2RoleforAWSCodeDeploy"));
        assert_eq!(plan.identity.assumed_by, "ec2.amazonaws.com");
    }

    #[test]
    fn test_access_policy_allows_only_web_and_ssh() {
        let (config, _script) = config_with_script();
        let plan = ChatServerStack::plan(&config).unwrap();
        let anywhere = Ipv4Addr::new(203, 0, 113, 9);

        assert!(plan.access_policy.permits(anywhere, Protocol::Tcp, 80));
        assert!(plan.access_policy.permits(anywhere, Protocol::Tcp, 22));
        assert!(!plan.access_policy.permits(anywhere, Protocol::Tcp, 443));
        assert!(!plan.access_policy.permits(anywhere, Protocol::Udp, 80));
        assert!(plan.access_policy.allow_all_outbound);
    }

    #[test]
    fn test_missing_bootstrap_script() {
        let config = ChatServerConfig {
            bootstrap_script: "/nonexistent/configure.sh".into(),
            ..ChatServerConfig::default()
        };
        let err = ChatServerStack::plan(&config).unwrap_err();
        assert_eq!(err.code, DefinitionCode::BOOTSTRAP_UNREADABLE);
    }

    #[test]
    fn test_network_too_small() {
        let (mut config, _script) = config_with_script();
        config.network_cidr = "10.0.0.0/23".to_string();
        let err = ChatServerStack::plan(&config).unwrap_err();
        assert_eq!(err.code, DefinitionCode::NETWORK_CAPACITY);
    }

    #[test]
    fn test_duplicate_port() {
        let (mut config, _script) = config_with_script();
        config.ingress_ports = vec![80, 80];
        let err = ChatServerStack::plan(&config).unwrap_err();
        assert_eq!(err.code, DefinitionCode::ACCESS_DUPLICATE);
    }
}
