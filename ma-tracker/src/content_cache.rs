//! utm_id → utm_content cache
//!
//! Some ad-platform links arrive without `utm_content` even though the same
//! campaign (`utm_id`) carried it on an earlier visit. The durable store keeps
//! the last known content per id so it can be filled back in.

use crate::storage::KeyValueStore;
use ma_common::attribution::{UTM_CONTENT, UTM_ID};
use ma_common::AttributionSet;
use std::sync::Arc;
use tracing::debug;

pub struct ContentCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
    capacity: usize,
}

impl ContentCache {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>, capacity: usize) -> Self {
        Self {
            store,
            key: key.into(),
            capacity: capacity.max(1),
        }
    }

    /// Oldest first
    fn entries(&self) -> Vec<(String, String)> {
        match self.store.get(&self.key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                debug!("Ignoring unreadable content cache: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                debug!("Content cache unavailable: {}", e);
                Vec::new()
            }
        }
    }

    pub fn remember(&self, utm_id: &str, content: &str) {
        if utm_id.is_empty() || content.is_empty() {
            return;
        }
        let mut entries = self.entries();
        entries.retain(|(id, _)| id != utm_id);
        entries.push((utm_id.to_string(), content.to_string()));
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }

        let result = serde_json::to_string(&entries)
            .map_err(crate::error::StorageError::from)
            .and_then(|raw| self.store.set(&self.key, &raw, None));
        if let Err(e) = result {
            debug!("Content cache write skipped: {}", e);
        }
    }

    pub fn lookup(&self, utm_id: &str) -> Option<String> {
        self.entries()
            .into_iter()
            .rev()
            .find(|(id, _)| id == utm_id)
            .map(|(_, content)| content)
    }

    /// Cache or restore `utm_content` keyed by `utm_id`
    ///
    /// With a non-empty content the pair is remembered; without one the
    /// cached content (if any) is written into `set`.
    pub fn apply(&self, set: &mut AttributionSet) {
        let Some(utm_id) = set.get(UTM_ID).filter(|id| !id.is_empty()).map(str::to_string) else {
            return;
        };

        let content = set
            .get(UTM_CONTENT)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        match content {
            Some(content) => self.remember(&utm_id, &content),
            None => {
                if let Some(cached) = self.lookup(&utm_id) {
                    debug!("Recovered utm_content for utm_id {} from cache", utm_id);
                    set.insert(UTM_CONTENT, cached);
                }
            }
        }
    }
}
