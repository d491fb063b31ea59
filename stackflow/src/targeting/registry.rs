//! Host registry and target selection.

use super::{TagSelector, TagSet};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use tracing::debug;

/// A host known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Provider-assigned host identifier.
    pub id: String,
    /// The host's tags, fixed at creation.
    pub tags: TagSet,
    /// Public address, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<Ipv4Addr>,
}

impl HostRecord {
    /// Creates a host record.
    #[must_use]
    pub fn new(id: impl Into<String>, tags: TagSet) -> Self {
        Self {
            id: id.into(),
            tags,
            public_ip: None,
        }
    }

    /// Sets the public address.
    #[must_use]
    pub fn with_public_ip(mut self, ip: Ipv4Addr) -> Self {
        self.public_ip = Some(ip);
        self
    }
}

/// Live mapping of host id → tags.
///
/// This is the fleet the deploy stage targets. Hosts may be added or
/// removed between pipeline runs; membership of a deployment group is
/// re-evaluated against the registry every time a deploy action runs.
#[derive(Debug, Default)]
pub struct HostRegistry {
    hosts: DashMap<String, HostRecord>,
}

impl HostRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host, replacing any previous record with the same id.
    pub fn register(&self, host: HostRecord) -> Option<HostRecord> {
        debug!(host = %host.id, tags = host.tags.len(), "Registering host");
        self.hosts.insert(host.id.clone(), host)
    }

    /// Removes a host.
    pub fn deregister(&self, id: &str) -> Option<HostRecord> {
        self.hosts.remove(id).map(|(_, host)| host)
    }

    /// Looks up a host.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<HostRecord> {
        self.hosts.get(id).map(|entry| entry.value().clone())
    }

    /// Returns the number of registered hosts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Returns true if no hosts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Returns every registered host, ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<HostRecord> {
        let mut hosts: Vec<HostRecord> = self.hosts.iter().map(|e| e.value().clone()).collect();
        hosts.sort_by(|a, b| a.id.cmp(&b.id));
        hosts
    }
}

/// Returns the ids of every registered host whose tags satisfy `selector`.
///
/// An empty result is not an error; callers decide how to report it.
#[must_use]
pub fn select_targets(registry: &HostRegistry, selector: &TagSelector) -> BTreeSet<String> {
    registry
        .hosts
        .iter()
        .filter(|entry| selector.matches(&entry.value().tags))
        .map(|entry| entry.key().clone())
        .collect()
}
