//! Network and host topology.
//!
//! This module provides:
//! - CIDR arithmetic and automatic segment allocation
//! - Default-deny access policies
//! - Host identities and host definitions
//! - The plan/apply split against a [`CloudProvider`]

mod access;
mod host;
mod identity;
mod network;
mod plan;
mod provider;

pub use access::{AccessPolicy, IngressRule, Peer, Protocol};
pub use host::{
    BootstrapScript, CpuType, HostBuilder, HostSpec, InstanceType, LinuxGeneration, MachineImage,
};
pub use identity::HostIdentity;
pub use network::{
    Ipv4Cidr, NetworkSpec, SegmentConfig, Subnet, SubnetType, MAX_BLOCK_PREFIX, MIN_NETWORK_PREFIX,
};
pub use plan::{AppliedTopology, StackOutputs, TopologyPlan, PUBLIC_IP_OUTPUT};
#[cfg(test)]
pub use provider::MockCloudProvider;
pub use provider::{CloudProvider, HostPlacement, LaunchedHost};
