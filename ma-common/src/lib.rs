//! # MA Common Library
//!
//! Shared code for the attribution collector and the repair job:
//! - Error type and configuration loading
//! - Clock abstraction
//! - Identifier generation
//! - Percent-decoding of campaign parameter values
//! - Telemetry wire types (events, batch payload, attribution sets)
//! - Persisted attribution record model

pub mod attribution;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod decode;
pub mod error;
pub mod events;
pub mod time;
pub mod uuid_utils;

pub use attribution::AttributionSet;
pub use decode::{fully_decode, normalize_bare_percent};
pub use error::{Error, Result};
pub use events::{BatchPayload, DeviceType, PageView, TelemetryEvent};
pub use time::{Clock, ManualClock, SystemClock};
