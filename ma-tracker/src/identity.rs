//! Visitor and session identity
//!
//! The visitor id lives in the durable store for years and is never
//! regenerated while its entry exists. The session id lives in the same
//! store with a short TTL; once the entry lapses a new id is issued.
//!
//! Storage failures never propagate: a fresh id is generated for this page
//! view and the failure is logged.

use crate::storage::KeyValueStore;
use ma_common::uuid_utils;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct IdentityManager {
    store: Arc<dyn KeyValueStore>,
    visitor_key: String,
    session_key: String,
    visitor_lifetime: Duration,
    session_timeout: Duration,
}

impl IdentityManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        visitor_key: impl Into<String>,
        session_key: impl Into<String>,
        visitor_lifetime: Duration,
        session_timeout: Duration,
    ) -> Self {
        Self {
            store,
            visitor_key: visitor_key.into(),
            session_key: session_key.into(),
            visitor_lifetime,
            session_timeout,
        }
    }

    /// Stored visitor id, creating and persisting one only if none exists
    pub fn get_or_create_visitor_id(&self) -> String {
        self.get_or_create(&self.visitor_key, self.visitor_lifetime)
    }

    /// Stored session id, issuing a new one once the previous entry expired
    pub fn get_or_create_session_id(&self) -> String {
        self.get_or_create(&self.session_key, self.session_timeout)
    }

    /// Restart the session timeout for `session_id` (sliding window)
    pub fn refresh_session(&self, session_id: &str) {
        if let Err(e) = self
            .store
            .set(&self.session_key, session_id, Some(self.session_timeout))
        {
            debug!("Session refresh skipped: {}", e);
        }
    }

    fn get_or_create(&self, key: &str, ttl: Duration) -> String {
        match self.store.get(key) {
            Ok(Some(id)) if !id.is_empty() => return id,
            Ok(_) => {}
            Err(e) => warn!("Cannot read {} ({}), issuing a per-page-view id", key, e),
        }

        let id = uuid_utils::generate_id();
        if let Err(e) = self.store.set(key, &id, Some(ttl)) {
            warn!("Cannot persist {}: {}", key, e);
        }
        id
    }
}
