//! Compute host definition.

use super::{AccessPolicy, HostIdentity, NetworkSpec};
use crate::errors::{DefinitionCode, DefinitionError};
use crate::targeting::TagSet;
use crate::utils::validate_resource_name;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Instance size class, e.g. `t2.micro`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceType {
    /// Instance family, e.g. `t2`.
    pub class: String,
    /// Size within the family, e.g. `micro`.
    pub size: String,
}

impl InstanceType {
    /// Creates an instance type.
    #[must_use]
    pub fn of(class: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            size: size.into(),
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.size)
    }
}

impl FromStr for InstanceType {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((class, size))
                if !class.is_empty()
                    && !size.is_empty()
                    && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') =>
            {
                Ok(Self::of(class, size))
            }
            _ => Err(DefinitionError::new(
                DefinitionCode::NAME_INVALID,
                format!("Invalid instance type '{s}': expected class.size"),
            )),
        }
    }
}

impl TryFrom<String> for InstanceType {
    type Error = DefinitionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InstanceType> for String {
    fn from(value: InstanceType) -> Self {
        value.to_string()
    }
}

/// Generation of the vendor Linux image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinuxGeneration {
    /// Amazon Linux 2.
    #[default]
    AmazonLinux2,
    /// Amazon Linux 2023.
    AmazonLinux2023,
}

/// CPU architecture of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuType {
    /// 64-bit x86.
    #[default]
    X86_64,
    /// 64-bit ARM.
    Arm64,
}

/// The machine image a host boots from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MachineImage {
    /// Latest vendor Linux image for the region, resolved by the provider.
    Linux {
        /// Image generation.
        generation: LinuxGeneration,
        /// Architecture.
        cpu: CpuType,
    },
    /// A fixed image id.
    Custom {
        /// Provider image id.
        image_id: String,
    },
}

impl Default for MachineImage {
    fn default() -> Self {
        Self::Linux {
            generation: LinuxGeneration::default(),
            cpu: CpuType::default(),
        }
    }
}

/// A first-boot script, read from disk at definition time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapScript {
    /// Where the script was read from.
    pub source_path: PathBuf,
    /// The script, verbatim.
    pub content: String,
    /// Hex-encoded SHA-256 of the content.
    pub sha256: String,
}

impl BootstrapScript {
    /// Reads a script from disk.
    ///
    /// # Errors
    ///
    /// Returns `DEF-BOOTSTRAP-UNREADABLE` if the file cannot be read as
    /// UTF-8 text.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DefinitionError::new(
                DefinitionCode::BOOTSTRAP_UNREADABLE,
                format!("Cannot read bootstrap script '{}': {e}", path.display()),
            )
            .with_resources([path.display().to_string()])
        })?;
        Ok(Self::from_content(path, content))
    }

    /// Wraps script text that is already in memory.
    #[must_use]
    pub fn from_content(source_path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            source_path: source_path.into(),
            sha256: hex::encode(Sha256::digest(content.as_bytes())),
            content,
        }
    }

    /// Returns the script encoded as base64 user data.
    #[must_use]
    pub fn user_data_base64(&self) -> String {
        STANDARD.encode(self.content.as_bytes())
    }
}

/// A fully bound compute host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    /// Host name.
    pub name: String,
    /// Instance size.
    pub instance_type: InstanceType,
    /// Key pair for remote shell access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    /// Boot image.
    pub image: MachineImage,
    /// Network the host lives in.
    pub network: String,
    /// Subnet the host is placed in.
    pub subnet: String,
    /// Access policy bound to the host.
    pub access_policy: String,
    /// Identity the host runs as.
    pub identity: String,
    /// First-boot script.
    pub bootstrap: BootstrapScript,
    /// Targeting tags.
    pub tags: TagSet,
}

/// Builder for [`HostSpec`].
#[derive(Debug, Clone)]
pub struct HostBuilder<'a> {
    name: String,
    network: Option<&'a NetworkSpec>,
    access_policy: Option<&'a AccessPolicy>,
    identity: Option<&'a HostIdentity>,
    image: MachineImage,
    instance_type: InstanceType,
    key_name: Option<String>,
    bootstrap_path: Option<PathBuf>,
    tags: Vec<(String, String)>,
}

impl<'a> HostBuilder<'a> {
    /// Starts a host definition. Defaults to a `t2.micro` running the
    /// default Linux image.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            network: None,
            access_policy: None,
            identity: None,
            image: MachineImage::default(),
            instance_type: InstanceType::of("t2", "micro"),
            key_name: None,
            bootstrap_path: None,
            tags: Vec::new(),
        }
    }

    /// Places the host in a network.
    #[must_use]
    pub fn network(mut self, network: &'a NetworkSpec) -> Self {
        self.network = Some(network);
        self
    }

    /// Binds the access policy.
    #[must_use]
    pub fn access_policy(mut self, policy: &'a AccessPolicy) -> Self {
        self.access_policy = Some(policy);
        self
    }

    /// Binds the identity.
    #[must_use]
    pub fn identity(mut self, identity: &'a HostIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Sets the boot image.
    #[must_use]
    pub fn image(mut self, image: MachineImage) -> Self {
        self.image = image;
        self
    }

    /// Sets the instance size.
    #[must_use]
    pub fn instance_type(mut self, instance_type: InstanceType) -> Self {
        self.instance_type = instance_type;
        self
    }

    /// Sets the key pair name.
    #[must_use]
    pub fn key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    /// Sets the bootstrap script path. The file is read by [`Self::build`].
    #[must_use]
    pub fn bootstrap_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.bootstrap_path = Some(path.into());
        self
    }

    /// Adds a targeting tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Validates every binding, reads the bootstrap script and returns the
    /// host definition.
    ///
    /// Nothing here talks to a provider, so a failure leaves no partial
    /// resources behind.
    pub fn build(self) -> Result<HostSpec, DefinitionError> {
        validate_resource_name("host", &self.name)?;
        let missing = |what: &str| {
            DefinitionError::new(
                DefinitionCode::HOST_INCOMPLETE,
                format!("Host '{}' has no {what}", self.name),
            )
            .with_resources([self.name.as_str()])
        };

        let network = self.network.ok_or_else(|| missing("network"))?;
        let policy = self.access_policy.ok_or_else(|| missing("access policy"))?;
        let identity = self.identity.ok_or_else(|| missing("identity"))?;
        let bootstrap_path = self.bootstrap_path.as_ref().ok_or_else(|| missing("bootstrap script"))?;
        let subnet = network
            .public_subnets()
            .next()
            .ok_or_else(|| missing("public subnet to be placed in"))?;
        if let Some(key_name) = &self.key_name {
            validate_resource_name("key pair", key_name)?;
        }
        let tags = TagSet::from_pairs(self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;

        let bootstrap = BootstrapScript::read(bootstrap_path)?;
        debug!(
            host = %self.name,
            subnet = %subnet.name,
            bootstrap_bytes = bootstrap.content.len(),
            "Defined host"
        );

        Ok(HostSpec {
            name: self.name.clone(),
            instance_type: self.instance_type.clone(),
            key_name: self.key_name.clone(),
            image: self.image.clone(),
            network: network.name.clone(),
            subnet: subnet.name.clone(),
            access_policy: policy.name.clone(),
            identity: identity.name.clone(),
            bootstrap,
            tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{IngressRule, Ipv4Cidr};
    use std::io::Write;

    struct Fixture {
        network: NetworkSpec,
        policy: AccessPolicy,
        identity: HostIdentity,
        script: tempfile::NamedTempFile,
    }

    fn fixture() -> Fixture {
        let cidr: Ipv4Cidr = "10.0.0.0/16".parse().unwrap();
        let mut script = tempfile::NamedTempFile::new().unwrap();
        writeln!(script, "#!/bin/bash\nyum install -y python3").unwrap();

        Fixture {
            network: NetworkSpec::public("vpc", cidr, 3, 24, "public", &[]).unwrap(),
            policy: AccessPolicy::define("web_sg", "", [IngressRule::tcp_from_anywhere(80)]).unwrap(),
            identity: HostIdentity::define("ec2Role", "ec2.amazonaws.com", ["AmazonSSMManagedInstanceCore"])
                .unwrap(),
            script,
        }
    }

    #[test]
    fn test_build_host() {
        let f = fixture();
        let host = HostBuilder::new("chat_server")
            .network(&f.network)
            .access_policy(&f.policy)
            .identity(&f.identity)
            .key_name("chat_server")
            .bootstrap_script(f.script.path())
            .tag("application-name", "python-chat-server")
            .tag("stage", "prod")
            .build()
            .unwrap();

        assert_eq!(host.instance_type.to_string(), "t2.micro");
        assert_eq!(host.subnet, "public01");
        assert_eq!(host.access_policy, "web_sg");
        assert_eq!(host.tags.get("stage"), Some("prod"));
        assert!(host.bootstrap.content.starts_with("#!/bin/bash"));
        assert_eq!(host.bootstrap.sha256.len(), 64);
    }

    #[test]
    fn test_unreadable_bootstrap_fails_fast() {
        let f = fixture();
        let err = HostBuilder::new("chat_server")
            .network(&f.network)
            .access_policy(&f.policy)
            .identity(&f.identity)
            .bootstrap_script("/definitely/not/here.sh")
            .build()
            .unwrap_err();

        assert_eq!(err.code, DefinitionCode::BOOTSTRAP_UNREADABLE);
        assert!(err.message.contains("/definitely/not/here.sh"));
    }

    #[test]
    fn test_missing_bindings() {
        let f = fixture();
        let err = HostBuilder::new("h")
            .network(&f.network)
            .bootstrap_script(f.script.path())
            .build()
            .unwrap_err();
        assert_eq!(err.code, DefinitionCode::HOST_INCOMPLETE);
        assert!(err.message.contains("access policy"));
    }

    #[test]
    fn test_invalid_tag() {
        let f = fixture();
        let err = HostBuilder::new("h")
            .network(&f.network)
            .access_policy(&f.policy)
            .identity(&f.identity)
            .bootstrap_script(f.script.path())
            .tag("aws:name", "x")
            .build()
            .unwrap_err();
        assert_eq!(err.code, DefinitionCode::TAG_INVALID);
    }

    #[test]
    fn test_user_data_base64() {
        let script = BootstrapScript::from_content("inline.sh", "echo hi");
        assert_eq!(script.user_data_base64(), "ZWNobyBoaQ==");
    }

    #[test]
    fn test_instance_type_parse() {
        let t: InstanceType = "m5.large".parse().unwrap();
        assert_eq!(t, InstanceType::of("m5", "large"));
        assert!("micro".parse::<InstanceType>().is_err());
        assert!("t2.".parse::<InstanceType>().is_err());
    }
}
