//! ma-tracker: visitor/session attribution collector
//!
//! Identifies visitors and sessions, extracts and repairs campaign
//! attribution from the landing URL, carries it across redirects that strip
//! the query string, and batches telemetry events for delivery on a timer and
//! at page teardown.
//!
//! Everything here is best-effort. Storage that cannot be read or written,
//! values that cannot be decoded and deliveries that fail all degrade to a
//! logged, documented fallback; nothing is surfaced to the host page as an
//! error.

pub mod attribution;
pub mod bridge;
pub mod config;
pub mod content_cache;
pub mod device;
pub mod error;
pub mod global;
pub mod identity;
pub mod lifecycle;
pub mod queue;
pub mod storage;
pub mod tracker;
pub mod transport;

pub use config::TrackerConfig;
pub use error::{StorageError, TransportError};
pub use lifecycle::TeardownSignal;
pub use queue::FlushOutcome;
pub use tracker::{PageContext, Tracker, TrackerDeps};
