//! Campaign attribution sets
//!
//! An [`AttributionSet`] maps campaign-parameter names (all sharing the
//! recognized prefix, `utm_` by default) to their decoded values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default prefix shared by all recognized campaign parameters
pub const DEFAULT_PREFIX: &str = "utm_";

pub const UTM_SOURCE: &str = "utm_source";
pub const UTM_MEDIUM: &str = "utm_medium";
pub const UTM_CAMPAIGN: &str = "utm_campaign";
pub const UTM_CONTENT: &str = "utm_content";
pub const UTM_ID: &str = "utm_id";

/// Campaign parameter name → decoded value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributionSet(BTreeMap<String, String>);

impl AttributionSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert or overwrite a parameter; returns the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True when any parameter was present with an empty value
    pub fn has_empty_value(&self) -> bool {
        self.0.values().any(String::is_empty)
    }

    /// Value of `key`, or `""` when absent (legacy flat fields)
    pub fn value_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AttributionSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<BTreeMap<String, String>> for AttributionSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_flat_object() {
        let set: AttributionSet =
            [(UTM_SOURCE, "naver"), (UTM_MEDIUM, "cpc")].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"utm_medium":"cpc","utm_source":"naver"}"#);

        let back: AttributionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_empty_value_detection() {
        let mut set = AttributionSet::new();
        set.insert(UTM_SOURCE, "fb");
        assert!(!set.has_empty_value());
        set.insert(UTM_CONTENT, "");
        assert!(set.has_empty_value());
    }

    #[test]
    fn test_value_or_empty() {
        let set: AttributionSet = [(UTM_SOURCE, "fb")].into_iter().collect();
        assert_eq!(set.value_or_empty(UTM_SOURCE), "fb");
        assert_eq!(set.value_or_empty(UTM_CAMPAIGN), "");
    }
}
