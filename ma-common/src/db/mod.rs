//! Persisted attribution data models

pub mod models;

pub use models::*;
