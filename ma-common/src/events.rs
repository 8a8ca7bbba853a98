//! Telemetry wire types
//!
//! Events are sent in batches as `{ "site_id": ..., "events": [...] }`.
//! Every event carries `type`, `visitor_id`, `session_id` and `timestamp`
//! (epoch milliseconds); the remaining keys depend on the event type and are
//! flattened into the same JSON object.

use crate::attribution::{AttributionSet, UTM_CAMPAIGN, UTM_MEDIUM, UTM_SOURCE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// `type` of a pageview event
pub const EVENT_PAGEVIEW: &str = "pageview";

/// `type` of the teardown event that closes a session's attribution window
pub const EVENT_SESSION_END: &str = "session_end";

/// Keys that caller-supplied event data can never override
pub const RESERVED_FIELDS: [&str; 4] = ["type", "visitor_id", "session_id", "timestamp"];

/// Coarse device class derived from the user agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Pc,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Pc => "pc",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pageview payload fields
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub url: String,
    pub title: String,
    pub referrer: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub device_type: DeviceType,
    pub user_agent: String,
    pub in_app: bool,
    /// Resolved attribution (fresh from the URL or restored)
    pub attribution: AttributionSet,
}

impl PageView {
    fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("url".into(), Value::String(self.url));
        fields.insert("title".into(), Value::String(self.title));
        fields.insert("referrer".into(), Value::String(self.referrer));
        fields.insert("screen_width".into(), Value::from(self.screen_width));
        fields.insert("screen_height".into(), Value::from(self.screen_height));
        fields.insert("device_type".into(), Value::String(self.device_type.to_string()));
        fields.insert("user_agent".into(), Value::String(self.user_agent));
        fields.insert("in_app".into(), Value::Bool(self.in_app));

        if !self.attribution.is_empty() {
            // Flat source/medium/campaign kept for older ingestion consumers
            for key in [UTM_SOURCE, UTM_MEDIUM, UTM_CAMPAIGN] {
                fields.insert(
                    key.into(),
                    Value::String(self.attribution.value_or_empty(key).to_string()),
                );
            }
            let params = self
                .attribution
                .into_inner()
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            fields.insert("utm_params".into(), Value::Object(params));
        }
        fields
    }
}

/// One tracked interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub visitor_id: String,
    pub session_id: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Type-specific payload
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TelemetryEvent {
    pub fn page_view(visitor_id: &str, session_id: &str, timestamp: i64, view: PageView) -> Self {
        Self {
            event_type: EVENT_PAGEVIEW.to_string(),
            visitor_id: visitor_id.to_string(),
            session_id: session_id.to_string(),
            timestamp,
            fields: view.into_fields(),
        }
    }

    pub fn session_end(visitor_id: &str, session_id: &str, timestamp: i64) -> Self {
        Self {
            event_type: EVENT_SESSION_END.to_string(),
            visitor_id: visitor_id.to_string(),
            session_id: session_id.to_string(),
            timestamp,
            fields: Map::new(),
        }
    }

    /// Caller-named event; reserved keys in `data` are discarded
    pub fn custom(
        name: &str,
        visitor_id: &str,
        session_id: &str,
        timestamp: i64,
        data: Map<String, Value>,
    ) -> Self {
        let fields = data
            .into_iter()
            .filter(|(k, _)| !RESERVED_FIELDS.contains(&k.as_str()))
            .collect();
        Self {
            event_type: name.to_string(),
            visitor_id: visitor_id.to_string(),
            session_id: session_id.to_string(),
            timestamp,
            fields,
        }
    }

    pub fn is_session_end(&self) -> bool {
        self.event_type == EVENT_SESSION_END
    }
}

/// Body POSTed to the collection endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPayload {
    pub site_id: String,
    pub events: Vec<TelemetryEvent>,
}

impl BatchPayload {
    pub fn new(site_id: impl Into<String>, events: Vec<TelemetryEvent>) -> Self {
        Self {
            site_id: site_id.into(),
            events,
        }
    }

    pub fn to_json_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
