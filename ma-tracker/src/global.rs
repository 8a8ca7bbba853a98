//! Process-wide entry point for host integration
//!
//! A host installs one tracker; later initialization attempts are refused so
//! a page that loads the collector twice still has a single instance.

use crate::tracker::Tracker;
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

static GLOBAL: OnceCell<Arc<Tracker>> = OnceCell::new();

/// Install `tracker` as the global instance
///
/// Returns `false` (and leaves the existing instance in place) when one is
/// already installed.
pub fn install(tracker: Arc<Tracker>) -> bool {
    if GLOBAL.set(tracker).is_err() {
        info!("Tracker already initialized, skipping duplicate initialization");
        return false;
    }
    true
}

pub fn global() -> Option<Arc<Tracker>> {
    GLOBAL.get().cloned()
}

/// `track_event` on the global instance; no-op before installation
pub async fn track_event(name: &str, data: Map<String, Value>) {
    if let Some(tracker) = GLOBAL.get() {
        tracker.track_event(name, data).await;
    }
}

/// `track_page_view` on the global instance; no-op before installation
pub async fn track_page_view() {
    if let Some(tracker) = GLOBAL.get() {
        tracker.track_page_view().await;
    }
}
