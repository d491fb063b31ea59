//! The cloud provider seam.

use super::{AccessPolicy, HostIdentity, HostSpec, NetworkSpec};
use crate::errors::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Where a host is launched, in provider ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPlacement {
    /// Provider id of the network.
    pub network_id: String,
    /// Name of the subnet inside that network.
    pub subnet: String,
    /// Provider id of the access policy.
    pub access_policy_id: String,
    /// Provider id of the identity.
    pub identity_id: String,
}

/// A host the provider has launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchedHost {
    /// Provider instance id.
    pub instance_id: String,
    /// Public IPv4 address.
    pub public_ip: Ipv4Addr,
}

/// Creates the concrete cloud resources behind a topology plan.
///
/// Implementations own address allocation enforcement, policy evaluation
/// and instance boot; stackflow only calls them in dependency order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Creates the host identity and returns its provider id.
    async fn create_identity(&self, identity: &HostIdentity) -> Result<String, ProviderError>;

    /// Creates the network and its subnets and returns the network id.
    async fn create_network(&self, network: &NetworkSpec) -> Result<String, ProviderError>;

    /// Creates the access policy inside a network and returns its id.
    async fn create_access_policy(
        &self,
        policy: &AccessPolicy,
        network_id: &str,
    ) -> Result<String, ProviderError>;

    /// Launches the host and waits for its public address.
    async fn launch_host(
        &self,
        host: &HostSpec,
        placement: &HostPlacement,
    ) -> Result<LaunchedHost, ProviderError>;
}
