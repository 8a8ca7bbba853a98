//! # ma-repair
//!
//! Offline backfill for stored attribution records whose `utm_content` was
//! lost to inconsistent URL encoding by ad platforms. The value is recovered
//! from the session's entry URL and merged back into the stored mapping.
//!
//! Safe to re-run: a repaired record no longer matches the selection.

pub mod config;
pub mod db;
pub mod error;
pub mod job;

pub use config::RepairConfig;
pub use error::RepairError;
pub use job::{run_repair, RepairOptions, RepairReport};
