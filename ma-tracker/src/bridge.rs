//! Attribution persistence across parameter-stripping navigations
//!
//! Login redirects and similar hops drop the query string, and with it the
//! campaign parameters. The bridge keeps the last usable attribution set in
//! tab-scoped storage so later page views in the same tab still carry it.
//!
//! Policy, applied once per page view:
//! 1. fresh set from the URL is usable → save it, use it
//! 2. otherwise → use the saved set, if any
//! 3. otherwise → empty set (direct traffic)
//!
//! A fresh set containing an empty-valued parameter (`utm_content=`) is a
//! truncated link and is treated as unusable.

use crate::storage::KeyValueStore;
use ma_common::AttributionSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Where the resolved attribution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionOrigin {
    Url,
    Restored,
    Direct,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAttribution {
    pub set: AttributionSet,
    pub origin: AttributionOrigin,
}

pub struct AttributionBridge {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl AttributionBridge {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Overwrite the saved set; empty sets are never written
    pub fn save(&self, set: &AttributionSet) {
        if set.is_empty() {
            return;
        }
        let result = serde_json::to_string(set)
            .map_err(crate::error::StorageError::from)
            .and_then(|raw| self.store.set(&self.key, &raw, None));
        match result {
            Ok(()) => debug!("Attribution saved to tab storage ({} params)", set.len()),
            Err(e) => debug!("Attribution not saved: {}", e),
        }
    }

    /// Saved set, `None` when absent or unreadable
    pub fn load(&self) -> Option<AttributionSet> {
        let raw = match self.store.get(&self.key) {
            Ok(raw) => raw?,
            Err(e) => {
                debug!("Attribution storage unavailable: {}", e);
                return None;
            }
        };
        match serde_json::from_str::<AttributionSet>(&raw) {
            Ok(set) if !set.is_empty() => Some(set),
            Ok(_) => None,
            Err(e) => {
                debug!("Ignoring unreadable saved attribution: {}", e);
                None
            }
        }
    }

    pub fn resolve(&self, fresh: AttributionSet) -> ResolvedAttribution {
        if !fresh.is_empty() && !fresh.has_empty_value() {
            self.save(&fresh);
            return ResolvedAttribution {
                set: fresh,
                origin: AttributionOrigin::Url,
            };
        }

        if !fresh.is_empty() {
            debug!("URL attribution has empty values, treating as truncated");
        }

        match self.load() {
            Some(saved) => {
                info!("Attribution restored from tab storage");
                ResolvedAttribution {
                    set: saved,
                    origin: AttributionOrigin::Restored,
                }
            }
            None => ResolvedAttribution {
                set: AttributionSet::new(),
                origin: AttributionOrigin::Direct,
            },
        }
    }
}
