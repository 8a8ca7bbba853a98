//! Database models

use crate::attribution::UTM_CONTENT;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribution row joined to the session row holding its entry URL
///
/// `utm_params` is the raw JSON text of the attribution mapping; it may be
/// NULL or (in damaged rows) not JSON at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttributionRecord {
    pub id: i64,
    pub session_id: String,
    pub utm_params: Option<String>,
    pub entry_url: Option<String>,
    pub entry_timestamp: Option<String>,
}

impl AttributionRecord {
    /// Parse the stored mapping; NULL reads as an empty mapping
    pub fn params(&self) -> Result<Map<String, Value>> {
        match self.utm_params.as_deref() {
            None => Ok(Map::new()),
            Some(raw) => match serde_json::from_str::<Value>(raw)? {
                Value::Object(map) => Ok(map),
                Value::Null => Ok(Map::new()),
                other => Err(crate::Error::InvalidInput(format!(
                    "utm_params of record {} is not an object: {}",
                    self.id, other
                ))),
            },
        }
    }

    /// Stored mapping with `utm_content` replaced, all other keys preserved
    pub fn params_with_content(&self, content: &str) -> Result<Map<String, Value>> {
        let mut params = self.params()?;
        params.insert(UTM_CONTENT.to_string(), Value::String(content.to_string()));
        Ok(params)
    }
}
