//! Tag selectors used by deployment groups.

use super::TagSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A set of tag predicates: key → allowed values.
///
/// A host matches when, for **every** key in the selector, the host carries
/// that key with **one of** the allowed values. Tags the selector does not
/// mention are ignored. Matching is exact and case-sensitive.
///
/// # Warning
///
/// An empty selector matches every host, including hosts with no tags at
/// all. A deployment group built from an empty selector therefore deploys
/// to the whole fleet; check [`TagSelector::is_match_all`] before using one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSelector(BTreeMap<String, BTreeSet<String>>);

impl TagSelector {
    /// Creates an empty (match-all) selector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate. Values for a key already present are merged into
    /// its allowed list.
    #[must_use]
    pub fn with_key(
        mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.0
            .entry(key.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Returns true if the host's tags satisfy every predicate.
    #[must_use]
    pub fn matches(&self, tags: &TagSet) -> bool {
        self.0.iter().all(|(key, allowed)| {
            tags.get(key)
                .is_some_and(|value| allowed.contains(value))
        })
    }

    /// Returns true if the selector has no predicates and so matches every
    /// host.
    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the allowed values for a key.
    #[must_use]
    pub fn allowed(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.0.get(key)
    }

    /// Iterates over predicates in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of predicate keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no predicates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V, I> FromIterator<(K, I)> for TagSelector
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = V>,
{
    fn from_iter<T: IntoIterator<Item = (K, I)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::new(), |selector, (key, values)| selector.with_key(key, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        TagSet::from_pairs(pairs.iter().copied()).unwrap()
    }

    fn selector(app: &str) -> TagSelector {
        TagSelector::new()
            .with_key("application-name", [app])
            .with_key("stage", ["prod", "stage"])
    }

    #[test]
    fn test_all_keys_must_match() {
        let host = tags(&[("application-name", "X"), ("stage", "prod")]);

        assert!(selector("X").matches(&host));
        assert!(!selector("Y").matches(&host));
    }

    #[test]
    fn test_any_value_within_key() {
        let host = tags(&[("application-name", "X"), ("stage", "stage")]);
        assert!(selector("X").matches(&host));

        let host = tags(&[("application-name", "X"), ("stage", "dev")]);
        assert!(!selector("X").matches(&host));
    }

    #[test]
    fn test_missing_key_does_not_match() {
        let host = tags(&[("application-name", "X")]);
        assert!(!selector("X").matches(&host));
    }

    #[test]
    fn test_extra_host_tags_ignored() {
        let host = tags(&[("application-name", "X"), ("stage", "prod"), ("team", "chat")]);
        assert!(selector("X").matches(&host));
    }

    #[test]
    fn test_matching_is_exact() {
        let host = tags(&[("application-name", "python-chat-server"), ("stage", "prod")]);
        assert!(!selector("python-chat").matches(&host));
        assert!(!selector("Python-Chat-Server").matches(&host));
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let all = TagSelector::new();
        assert!(all.is_match_all());
        assert!(all.matches(&TagSet::new()));
        assert!(all.matches(&tags(&[("stage", "prod")])));
    }

    #[test]
    fn test_empty_value_list_matches_nothing() {
        let none = TagSelector::new().with_key("stage", Vec::<String>::new());
        assert!(!none.is_match_all());
        assert!(!none.matches(&tags(&[("stage", "prod")])));
    }

    #[test]
    fn test_from_iterator_and_serde() {
        let sel: TagSelector = [("stage", vec!["prod", "stage"])].into_iter().collect();
        assert_eq!(sel.allowed("stage").unwrap().len(), 2);

        let json = serde_json::to_string(&sel).unwrap();
        assert_eq!(json, r#"{"stage":["prod","stage"]}"#);
        let back: TagSelector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sel);
    }
}
