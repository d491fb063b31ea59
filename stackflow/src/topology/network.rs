//! Isolated network and subnet allocation.

use crate::errors::{DefinitionCode, DefinitionError};
use crate::utils::validate_resource_name;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::debug;

/// Shortest network prefix a network may use.
pub const MIN_NETWORK_PREFIX: u8 = 16;
/// Longest prefix any block (network or segment) may use.
pub const MAX_BLOCK_PREFIX: u8 = 28;

/// An IPv4 address block in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Creates a block. The address must be the block's network address.
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self, DefinitionError> {
        let invalid = |reason: String| {
            Err(DefinitionError::new(
                DefinitionCode::NETWORK_CIDR,
                format!("Invalid CIDR block {network}/{prefix}: {reason}"),
            ))
        };
        if prefix > 32 {
            return invalid("prefix must be at most 32".to_string());
        }
        let cidr = Self { network, prefix };
        if u32::from(network) & !cidr.mask() != 0 {
            return invalid(format!("host bits are set, expected {}", Ipv4Addr::from(u32::from(network) & cidr.mask())));
        }
        Ok(cidr)
    }

    /// The network address.
    #[must_use]
    pub const fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// The prefix length.
    #[must_use]
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses in the block.
    #[must_use]
    pub const fn size(&self) -> u64 {
        1u64 << (32 - self.prefix)
    }

    fn mask(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix)
        }
    }

    fn first(&self) -> u64 {
        u64::from(u32::from(self.network))
    }

    fn end(&self) -> u64 {
        self.first() + self.size()
    }

    /// Returns true if the address lies in the block.
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & self.mask() == u32::from(self.network)
    }

    /// Returns true if `other` lies entirely inside this block.
    #[must_use]
    pub fn contains_block(&self, other: &Self) -> bool {
        other.first() >= self.first() && other.end() <= self.end()
    }

    /// Returns true if the two blocks share any address.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.first() < other.end() && other.first() < self.end()
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_error = || {
            DefinitionError::new(
                DefinitionCode::NETWORK_CIDR,
                format!("Invalid CIDR block '{s}': expected a.b.c.d/n"),
            )
        };
        let (addr, prefix) = s.split_once('/').ok_or_else(parse_error)?;
        let addr: Ipv4Addr = addr.trim().parse().map_err(|_| parse_error())?;
        let prefix: u8 = prefix.trim().parse().map_err(|_| parse_error())?;
        Self::new(addr, prefix)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = DefinitionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ipv4Cidr> for String {
    fn from(value: Ipv4Cidr) -> Self {
        value.to_string()
    }
}

/// Reachability class of a subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetType {
    /// Routed to the internet gateway; hosts get public addresses.
    Public,
    /// Outbound-only through a NAT.
    Private,
    /// No route outside the network.
    Isolated,
}

/// Requested shape of one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Segment name.
    pub name: String,
    /// Prefix length of the segment's block.
    pub mask: u8,
    /// Reachability class.
    pub subnet_type: SubnetType,
}

impl SegmentConfig {
    /// Creates a public segment request.
    #[must_use]
    pub fn public(name: impl Into<String>, mask: u8) -> Self {
        Self {
            name: name.into(),
            mask,
            subnet_type: SubnetType::Public,
        }
    }
}

/// A subnet with its allocated block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    /// Subnet name.
    pub name: String,
    /// Allocated block.
    pub cidr: Ipv4Cidr,
    /// Reachability class.
    pub subnet_type: SubnetType,
    /// Availability zone, when zones are configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    /// Whether hosts launched here receive a public address.
    pub map_public_ip_on_launch: bool,
}

/// An isolated network and its segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Network name.
    pub name: String,
    /// The network's address space.
    pub cidr: Ipv4Cidr,
    /// Allocated segments, in request order.
    pub subnets: Vec<Subnet>,
}

impl NetworkSpec {
    /// Defines a network of `count` equally sized public segments named
    /// `{name_prefix}01`, `{name_prefix}02`, ...
    pub fn public(
        name: impl Into<String>,
        cidr: Ipv4Cidr,
        count: usize,
        mask: u8,
        name_prefix: &str,
        zones: &[String],
    ) -> Result<Self, DefinitionError> {
        let segments: Vec<SegmentConfig> = (1..=count)
            .map(|i| SegmentConfig::public(format!("{name_prefix}{i:02}"), mask))
            .collect();
        Self::define(name, cidr, &segments, zones)
    }

    /// Defines a network and allocates a distinct, non-overlapping block for
    /// every segment.
    ///
    /// Blocks are carved from the start of the address space in request
    /// order, each aligned to its own size. Zones are assigned round-robin.
    ///
    /// # Errors
    ///
    /// Fails when there are no segments, a mask is shorter than the network
    /// prefix or longer than /28, names repeat, or the blocks do not fit.
    pub fn define(
        name: impl Into<String>,
        cidr: Ipv4Cidr,
        segments: &[SegmentConfig],
        zones: &[String],
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        validate_resource_name("network", &name)?;

        if !(MIN_NETWORK_PREFIX..=MAX_BLOCK_PREFIX).contains(&cidr.prefix()) {
            return Err(DefinitionError::new(
                DefinitionCode::NETWORK_MASK,
                format!(
                    "Network {cidr} must use a prefix between /{MIN_NETWORK_PREFIX} and /{MAX_BLOCK_PREFIX}"
                ),
            )
            .with_resources([name]));
        }
        if segments.is_empty() {
            return Err(DefinitionError::new(
                DefinitionCode::NETWORK_EMPTY,
                format!("Network '{name}' has no segments"),
            )
            .with_resources([name]));
        }

        let mut seen = HashSet::new();
        let mut cursor = cidr.first();
        let mut subnets = Vec::with_capacity(segments.len());

        for (index, segment) in segments.iter().enumerate() {
            validate_resource_name("subnet", &segment.name)?;
            if !seen.insert(segment.name.as_str()) {
                return Err(DefinitionError::new(
                    DefinitionCode::NETWORK_DUPLICATE,
                    format!("Segment name '{}' is used twice", segment.name),
                )
                .with_resources([name.as_str(), segment.name.as_str()]));
            }
            if segment.mask < cidr.prefix() || segment.mask > MAX_BLOCK_PREFIX {
                return Err(DefinitionError::new(
                    DefinitionCode::NETWORK_MASK,
                    format!(
                        "Segment '{}' asks for /{} inside {cidr}",
                        segment.name, segment.mask
                    ),
                )
                .with_resources([name.as_str(), segment.name.as_str()]));
            }

            let block = 1u64 << (32 - segment.mask);
            let start = cursor.div_ceil(block) * block;
            if start + block > cidr.end() {
                return Err(DefinitionError::new(
                    DefinitionCode::NETWORK_CAPACITY,
                    format!(
                        "Network {cidr} cannot hold segment '{}' (/{}) after {} allocated segment(s)",
                        segment.name,
                        segment.mask,
                        subnets.len()
                    ),
                )
                .with_resources([name.as_str(), segment.name.as_str()]));
            }
            cursor = start + block;

            // start + block <= cidr.end() <= 2^32, so start fits in u32.
            let network = Ipv4Addr::from(u32::try_from(start).unwrap_or(u32::MAX));
            let subnet_cidr = Ipv4Cidr::new(network, segment.mask)?;
            debug!(network = %name, subnet = %segment.name, cidr = %subnet_cidr, "Allocated segment");

            subnets.push(Subnet {
                name: segment.name.clone(),
                cidr: subnet_cidr,
                subnet_type: segment.subnet_type,
                availability_zone: (!zones.is_empty()).then(|| zones[index % zones.len()].clone()),
                map_public_ip_on_launch: segment.subnet_type == SubnetType::Public,
            });
        }

        Ok(Self { name, cidr, subnets })
    }

    /// Returns the public subnets.
    pub fn public_subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.subnets
            .iter()
            .filter(|s| s.subnet_type == SubnetType::Public)
    }

    /// Looks up a subnet by name.
    #[must_use]
    pub fn subnet(&self, name: &str) -> Option<&Subnet> {
        self.subnets.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cidr(s: &str) -> Ipv4Cidr {
        s.parse().unwrap()
    }

    fn zones() -> Vec<String> {
        vec!["zone-a".to_string(), "zone-b".to_string()]
    }

    #[test]
    fn test_cidr_parse_and_display() {
        let block = cidr("10.0.0.0/16");
        assert_eq!(block.prefix(), 16);
        assert_eq!(block.size(), 65_536);
        assert_eq!(block.to_string(), "10.0.0.0/16");
        assert!(block.contains("10.0.255.1".parse().unwrap()));
        assert!(!block.contains("10.1.0.0".parse().unwrap()));
    }

    #[test]
    fn test_cidr_rejects_garbage() {
        assert!("10.0.0.0".parse::<Ipv4Cidr>().is_err());
        assert!("10.0.0.0/33".parse::<Ipv4Cidr>().is_err());
        assert!("nope/16".parse::<Ipv4Cidr>().is_err());

        let err = "10.0.0.1/16".parse::<Ipv4Cidr>().unwrap_err();
        assert_eq!(err.code, DefinitionCode::NETWORK_CIDR);
        assert!(err.message.contains("10.0.0.0"));
    }

    #[test]
    fn test_cidr_overlap() {
        assert!(cidr("10.0.0.0/16").overlaps(&cidr("10.0.1.0/24")));
        assert!(!cidr("10.0.0.0/24").overlaps(&cidr("10.0.1.0/24")));
        assert!(cidr("10.0.0.0/16").contains_block(&cidr("10.0.2.0/24")));
    }

    #[test]
    fn test_cidr_serde_as_string() {
        let json = serde_json::to_string(&cidr("10.0.0.0/16")).unwrap();
        assert_eq!(json, r#""10.0.0.0/16""#);
        assert!(serde_json::from_str::<Ipv4Cidr>(r#""10.0.0.5/16""#).is_err());
    }

    #[test]
    fn test_three_public_segments() {
        let network =
            NetworkSpec::public("chat_server_vpc", cidr("10.0.0.0/16"), 3, 24, "public", &zones())
                .unwrap();

        let blocks: Vec<String> = network.subnets.iter().map(|s| s.cidr.to_string()).collect();
        assert_eq!(blocks, vec!["10.0.0.0/24", "10.0.1.0/24", "10.0.2.0/24"]);

        let names: Vec<&str> = network.subnets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["public01", "public02", "public03"]);

        for (i, a) in network.subnets.iter().enumerate() {
            assert!(network.cidr.contains_block(&a.cidr));
            assert!(a.map_public_ip_on_launch);
            for b in &network.subnets[i + 1..] {
                assert!(!a.cidr.overlaps(&b.cidr));
            }
        }
        assert_eq!(network.public_subnets().count(), 3);
        assert_eq!(network.subnets[2].availability_zone.as_deref(), Some("zone-a"));
    }

    #[test]
    fn test_segments_that_do_not_fit() {
        let err = NetworkSpec::public("vpc", cidr("10.0.0.0/23"), 3, 24, "public", &[]).unwrap_err();
        assert_eq!(err.code, DefinitionCode::NETWORK_CAPACITY);
        assert!(err.resources.contains(&"public03".to_string()));
    }

    #[test]
    fn test_exact_fit() {
        let network = NetworkSpec::public("vpc", cidr("10.0.0.0/22"), 4, 24, "public", &[]).unwrap();
        assert_eq!(network.subnets[3].cidr.to_string(), "10.0.3.0/24");
        assert!(network.subnets[3].availability_zone.is_none());
    }

    #[test]
    fn test_mixed_sizes_are_aligned() {
        let segments = vec![
            SegmentConfig::public("small", 26),
            SegmentConfig {
                name: "big".to_string(),
                mask: 24,
                subnet_type: SubnetType::Isolated,
            },
        ];
        let network = NetworkSpec::define("vpc", cidr("10.0.0.0/16"), &segments, &[]).unwrap();

        assert_eq!(network.subnets[0].cidr.to_string(), "10.0.0.0/26");
        assert_eq!(network.subnets[1].cidr.to_string(), "10.0.1.0/24");
        assert!(!network.subnets[1].map_public_ip_on_launch);
        assert_eq!(network.public_subnets().count(), 1);
    }

    #[test]
    fn test_invalid_masks() {
        let err = NetworkSpec::public("vpc", cidr("10.0.0.0/24"), 1, 16, "public", &[]).unwrap_err();
        assert_eq!(err.code, DefinitionCode::NETWORK_MASK);

        let err = NetworkSpec::public("vpc", cidr("10.0.0.0/16"), 1, 30, "public", &[]).unwrap_err();
        assert_eq!(err.code, DefinitionCode::NETWORK_MASK);

        let err = NetworkSpec::public("vpc", cidr("10.0.0.0/8"), 1, 24, "public", &[]).unwrap_err();
        assert_eq!(err.code, DefinitionCode::NETWORK_MASK);
    }

    #[test]
    fn test_empty_and_duplicate_segments() {
        let err = NetworkSpec::public("vpc", cidr("10.0.0.0/16"), 0, 24, "public", &[]).unwrap_err();
        assert_eq!(err.code, DefinitionCode::NETWORK_EMPTY);

        let segments = vec![SegmentConfig::public("a", 24), SegmentConfig::public("a", 24)];
        let err = NetworkSpec::define("vpc", cidr("10.0.0.0/16"), &segments, &[]).unwrap_err();
        assert_eq!(err.code, DefinitionCode::NETWORK_DUPLICATE);
    }
}
