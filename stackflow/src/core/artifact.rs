//! Artifacts passed between pipeline actions.

use super::StageKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// The name of an artifact, unique within a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactName(String);

impl ArtifactName {
    /// Creates a new artifact name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ArtifactName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque handle to the payload behind an artifact.
///
/// The orchestrator never looks inside the payload; it only carries the
/// location and, when known, a content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadHandle {
    /// Where the payload lives (e.g. an object-store URI).
    pub uri: String,
    /// Hex-encoded SHA-256 of the payload content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl PayloadHandle {
    /// Creates a handle with no digest.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            digest: None,
        }
    }

    /// Creates a handle and records the SHA-256 digest of `content`.
    #[must_use]
    pub fn from_content(uri: impl Into<String>, content: &[u8]) -> Self {
        Self {
            uri: uri.into(),
            digest: Some(hex::encode(Sha256::digest(content))),
        }
    }
}

/// An immutable artifact produced by exactly one action during one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// The artifact name.
    pub name: ArtifactName,
    /// The payload handle.
    pub payload: PayloadHandle,
    /// The action that produced it.
    pub produced_by: String,
    /// The stage of the producing action.
    pub stage: StageKind,
    /// When the artifact was produced (ISO 8601).
    pub created_at: String,
}

impl Artifact {
    /// Creates a new artifact stamped with the current time.
    #[must_use]
    pub fn new(
        name: ArtifactName,
        payload: PayloadHandle,
        produced_by: impl Into<String>,
        stage: StageKind,
    ) -> Self {
        Self {
            name,
            payload,
            produced_by: produced_by.into(),
            stage,
            created_at: crate::utils::iso_timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_name() {
        let name = ArtifactName::from("ChatServiceBuildOutput");
        assert_eq!(name.as_str(), "ChatServiceBuildOutput");
        assert_eq!(name.to_string(), "ChatServiceBuildOutput");
        assert_eq!(serde_json::to_string(&name).unwrap(), r#""ChatServiceBuildOutput""#);
    }

    #[test]
    fn test_payload_digest() {
        let handle = PayloadHandle::from_content("s3://bucket/key", b"hello");
        assert_eq!(
            handle.digest.as_deref(),
            Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
        assert!(PayloadHandle::new("s3://bucket/key").digest.is_none());
    }

    #[test]
    fn test_artifact_creation() {
        let artifact = Artifact::new(
            "out".into(),
            PayloadHandle::new("mem://out"),
            "ChatService_Source",
            StageKind::Source,
        );

        assert_eq!(artifact.produced_by, "ChatService_Source");
        assert_eq!(artifact.stage, StageKind::Source);
        assert!(artifact.created_at.contains('T'));
    }
}
