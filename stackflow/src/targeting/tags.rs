//! Host tag sets.

use crate::errors::DefinitionError;
use crate::utils::validate_tag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An immutable set of key/value tags carried by a host.
///
/// Tags are fixed when the host is defined and are the only way the deploy
/// stage discovers hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    /// Creates an empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a validated tag set from key/value pairs. A repeated key keeps
    /// its last value.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self, DefinitionError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut tags = BTreeMap::new();
        for (key, value) in pairs {
            let (key, value) = (key.into(), value.into());
            validate_tag(&key, &value)?;
            tags.insert(key, value);
        }
        Ok(Self(tags))
    }

    /// Returns a copy with one more tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self, DefinitionError> {
        let (key, value) = (key.into(), value.into());
        validate_tag(&key, &value)?;
        self.0.insert(key, value);
        Ok(self)
    }

    /// Returns the value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates over tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set has no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
