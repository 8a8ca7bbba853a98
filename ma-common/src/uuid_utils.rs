//! UUID utilities

use uuid::Uuid;

/// Generate a new UUIDv4 in its hyphenated string form
///
/// Visitor and session identifiers are stored and sent as strings.
pub fn generate_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}
