//! Allow-list access policies.

use super::Ipv4Cidr;
use crate::errors::{DefinitionCode, DefinitionError};
use crate::utils::validate_resource_name;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;

/// Transport protocol of an ingress rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Source of inbound traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "cidr")]
pub enum Peer {
    /// Any IPv4 address (`0.0.0.0/0`).
    AnyIpv4,
    /// A specific block.
    Cidr(Ipv4Cidr),
}

impl Peer {
    /// Returns true if `addr` belongs to this peer.
    #[must_use]
    pub fn includes(&self, addr: Ipv4Addr) -> bool {
        match self {
            Self::AnyIpv4 => true,
            Self::Cidr(cidr) => cidr.contains(addr),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyIpv4 => write!(f, "0.0.0.0/0"),
            Self::Cidr(cidr) => write!(f, "{cidr}"),
        }
    }
}

/// One allowed inbound flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IngressRule {
    /// Allowed source.
    pub peer: Peer,
    /// Protocol.
    pub protocol: Protocol,
    /// Destination port.
    pub port: u16,
}

impl IngressRule {
    /// Allows TCP on `port` from any IPv4 address.
    #[must_use]
    pub const fn tcp_from_anywhere(port: u16) -> Self {
        Self {
            peer: Peer::AnyIpv4,
            protocol: Protocol::Tcp,
            port,
        }
    }
}

impl fmt::Display for IngressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.peer, self.protocol, self.port)
    }
}

/// A default-deny inbound allow-list with unrestricted outbound traffic.
///
/// There are no deny rules: anything not listed is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Policy name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Allowed inbound flows.
    pub ingress: Vec<IngressRule>,
    /// Outbound traffic is always allowed.
    pub allow_all_outbound: bool,
}

impl AccessPolicy {
    /// Defines an access policy.
    ///
    /// # Errors
    ///
    /// Rejects duplicated rules and rules on port 0.
    pub fn define(
        name: impl Into<String>,
        description: impl Into<String>,
        rules: impl IntoIterator<Item = IngressRule>,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        validate_resource_name("access policy", &name)?;

        let mut seen = HashSet::new();
        let mut ingress = Vec::new();
        for rule in rules {
            if rule.port == 0 {
                return Err(DefinitionError::new(
                    DefinitionCode::ACCESS_PORT,
                    format!("Rule '{rule}' in '{name}' uses port 0"),
                )
                .with_resources([name]));
            }
            if !seen.insert(rule) {
                return Err(DefinitionError::new(
                    DefinitionCode::ACCESS_DUPLICATE,
                    format!("Rule '{rule}' is listed twice in '{name}'"),
                )
                .with_resources([name]));
            }
            ingress.push(rule);
        }

        Ok(Self {
            name,
            description: description.into(),
            ingress,
            allow_all_outbound: true,
        })
    }

    /// Returns true if an inbound connection from `source` is allowed.
    #[must_use]
    pub fn permits(&self, source: Ipv4Addr, protocol: Protocol, port: u16) -> bool {
        self.ingress
            .iter()
            .any(|rule| rule.protocol == protocol && rule.port == port && rule.peer.includes(source))
    }

    /// Returns true if outbound connections are allowed.
    #[must_use]
    pub const fn permits_outbound(&self) -> bool {
        self.allow_all_outbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web_policy() -> AccessPolicy {
        AccessPolicy::define(
            "web_sg",
            "Allows Inbound HTTP traffic to the web server.",
            [IngressRule::tcp_from_anywhere(80), IngressRule::tcp_from_anywhere(22)],
        )
        .unwrap()
    }

    #[test]
    fn test_allow_listed_ports() {
        let policy = web_policy();
        let anyone: Ipv4Addr = "203.0.113.7".parse().unwrap();

        assert!(policy.permits(anyone, Protocol::Tcp, 80));
        assert!(policy.permits(anyone, Protocol::Tcp, 22));
        assert!(policy.permits_outbound());
    }

    #[test]
    fn test_default_deny() {
        let policy = web_policy();
        let anyone: Ipv4Addr = "203.0.113.7".parse().unwrap();

        assert!(!policy.permits(anyone, Protocol::Tcp, 443));
        assert!(!policy.permits(anyone, Protocol::Udp, 80));

        let closed = AccessPolicy::define("closed", "", []).unwrap();
        assert!(!closed.permits(anyone, Protocol::Tcp, 22));
    }

    #[test]
    fn test_cidr_peer() {
        let office: Ipv4Cidr = "198.51.100.0/24".parse().unwrap();
        let policy = AccessPolicy::define(
            "ssh_only",
            "",
            [IngressRule {
                peer: Peer::Cidr(office),
                protocol: Protocol::Tcp,
                port: 22,
            }],
        )
        .unwrap();

        assert!(policy.permits("198.51.100.9".parse().unwrap(), Protocol::Tcp, 22));
        assert!(!policy.permits("203.0.113.7".parse().unwrap(), Protocol::Tcp, 22));
    }

    #[test]
    fn test_invalid_rules() {
        let err = AccessPolicy::define(
            "dup",
            "",
            [IngressRule::tcp_from_anywhere(80), IngressRule::tcp_from_anywhere(80)],
        )
        .unwrap_err();
        assert_eq!(err.code, DefinitionCode::ACCESS_DUPLICATE);

        let err = AccessPolicy::define("zero", "", [IngressRule::tcp_from_anywhere(0)]).unwrap_err();
        assert_eq!(err.code, DefinitionCode::ACCESS_PORT);
    }

    #[test]
    fn test_rule_display() {
        assert_eq!(IngressRule::tcp_from_anywhere(80).to_string(), "0.0.0.0/0 tcp/80");
    }
}
