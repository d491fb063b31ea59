//! Per-run artifact store.

use super::{Artifact, ArtifactName};
use crate::errors::ArtifactConflictError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Holds the artifacts produced during a single pipeline run.
///
/// Artifacts are write-once: a second write to the same name is rejected,
/// so readers never observe a mutation. The store also records which
/// actions consumed each artifact.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    artifacts: RwLock<BTreeMap<ArtifactName, Arc<Artifact>>>,
    consumers: RwLock<BTreeMap<ArtifactName, BTreeSet<String>>>,
}

impl ArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a newly produced artifact.
    pub fn insert(&self, artifact: Artifact) -> Result<Arc<Artifact>, ArtifactConflictError> {
        let mut artifacts = self.artifacts.write();
        if let Some(existing) = artifacts.get(&artifact.name) {
            return Err(ArtifactConflictError {
                artifact: artifact.name.to_string(),
                existing_producer: existing.produced_by.clone(),
                producer: artifact.produced_by,
            });
        }
        let artifact = Arc::new(artifact);
        artifacts.insert(artifact.name.clone(), Arc::clone(&artifact));
        Ok(artifact)
    }

    /// Looks up an artifact by name.
    #[must_use]
    pub fn get(&self, name: &ArtifactName) -> Option<Arc<Artifact>> {
        self.artifacts.read().get(name).cloned()
    }

    /// Looks up an artifact and records `consumer` as having read it.
    #[must_use]
    pub fn consume(&self, name: &ArtifactName, consumer: &str) -> Option<Arc<Artifact>> {
        let artifact = self.get(name)?;
        self.consumers
            .write()
            .entry(name.clone())
            .or_default()
            .insert(consumer.to_string());
        Some(artifact)
    }

    /// Returns true if the artifact has been produced.
    #[must_use]
    pub fn contains(&self, name: &ArtifactName) -> bool {
        self.artifacts.read().contains_key(name)
    }

    /// Returns the actions that consumed an artifact.
    #[must_use]
    pub fn consumers_of(&self, name: &ArtifactName) -> BTreeSet<String> {
        self.consumers.read().get(name).cloned().unwrap_or_default()
    }

    /// Returns produced artifacts that no action consumed.
    #[must_use]
    pub fn unconsumed(&self) -> Vec<ArtifactName> {
        let consumers = self.consumers.read();
        self.artifacts
            .read()
            .keys()
            .filter(|name| !consumers.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Returns the number of artifacts produced.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    /// Returns true if nothing has been produced yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }

    /// Returns a copy of every artifact, ordered by name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Artifact> {
        self.artifacts
            .read()
            .values()
            .map(|artifact| Artifact::clone(artifact))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PayloadHandle, StageKind};

    fn artifact(name: &str, producer: &str) -> Artifact {
        Artifact::new(
            name.into(),
            PayloadHandle::new(format!("mem://{name}")),
            producer,
            StageKind::Source,
        )
    }

    #[test]
    fn test_insert_and_get() {
        let store = ArtifactStore::new();
        assert!(store.is_empty());

        store.insert(artifact("a", "fetch")).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.contains(&"a".into()));
        assert_eq!(store.get(&"a".into()).unwrap().produced_by, "fetch");
    }

    #[test]
    fn test_second_write_rejected() {
        let store = ArtifactStore::new();
        store.insert(artifact("a", "first")).unwrap();

        let err = store.insert(artifact("a", "second")).unwrap_err();
        assert_eq!(err.existing_producer, "first");
        assert_eq!(err.producer, "second");
        assert_eq!(store.get(&"a".into()).unwrap().produced_by, "first");
    }

    #[test]
    fn test_consumers_and_unconsumed() {
        let store = ArtifactStore::new();
        store.insert(artifact("a", "p1")).unwrap();
        store.insert(artifact("b", "p2")).unwrap();

        assert!(store.consume(&"a".into(), "build").is_some());
        assert!(store.consume(&"missing".into(), "build").is_none());

        assert_eq!(store.consumers_of(&"a".into()).len(), 1);
        assert_eq!(store.unconsumed(), vec![ArtifactName::from("b")]);
    }
}
