//! Old-reference to new-reference mapping consumed by the rewriter.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

/// Mapping from a reference string as it appears in a manifest (bare file name,
/// relative path or `URI="..."` value) to its replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceMap {
    entries: BTreeMap<String, String>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mapping, returning the replaced value if the key was already staged.
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, old: K, new: V) -> Option<String> {
        self.entries.insert(old.into(), new.into())
    }

    pub fn get(&self, old: &str) -> Option<&str> {
        self.entries.get(old).map(String::as_str)
    }

    pub fn contains_key(&self, old: &str) -> bool {
        self.entries.contains_key(old)
    }

    /// True if any mapped value equals `reference`.
    pub fn contains_value(&self, reference: &str) -> bool {
        self.entries.values().any(|v| v == reference)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True if applying the map would change nothing.
    pub fn is_identity(&self) -> bool {
        self.entries.iter().all(|(k, v)| k == v)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ReferenceMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<HashMap<String, String>> for ReferenceMap {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}
