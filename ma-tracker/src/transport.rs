//! Batch delivery
//!
//! Two primitives, mirroring what a page has at hand:
//! - [`BeaconTransport`]: non-blocking, unload-safe, fire-and-forget. Its
//!   only feedback is whether the payload was accepted for sending.
//! - [`FallbackTransport`]: a request that is allowed to finish after the
//!   page starts unloading, with a real success/failure result.
//!
//! [`Transport`] uses the beacon whenever one is available and the fallback
//! only when it is not.

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Which primitive carried a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Beacon,
    Fallback,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Beacon => f.write_str("beacon"),
            Channel::Fallback => f.write_str("fallback"),
        }
    }
}

/// Unload-safe, fire-and-forget send
pub trait BeaconTransport: Send + Sync {
    /// True when the payload was queued for sending
    fn send_beacon(&self, endpoint: &str, body: Vec<u8>) -> bool;
}

/// Request that may complete after unload begins
#[async_trait]
pub trait FallbackTransport: Send + Sync {
    async fn send_keepalive(&self, endpoint: &str, body: Vec<u8>) -> Result<(), TransportError>;
}

/// Beacon over HTTP: the POST is spawned on the tokio runtime and never
/// awaited by the caller
pub struct HttpBeacon {
    client: Client,
}

impl HttpBeacon {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl BeaconTransport for HttpBeacon {
    fn send_beacon(&self, endpoint: &str, body: Vec<u8>) -> bool {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available for beacon send");
            return false;
        };

        let request = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        handle.spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    debug!("Beacon answered with {}", response.status());
                }
                Ok(_) => {}
                Err(e) => debug!("Beacon send failed: {}", e),
            }
        });
        true
    }
}

/// Awaited POST with a timeout; non-2xx counts as failure
pub struct HttpFallback {
    client: Client,
    timeout: Duration,
}

impl HttpFallback {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl FallbackTransport for HttpFallback {
    async fn send_keepalive(&self, endpoint: &str, body: Vec<u8>) -> Result<(), TransportError> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }
}

/// Endpoint plus the primitives available on this page
#[derive(Clone)]
pub struct Transport {
    endpoint: String,
    beacon: Option<Arc<dyn BeaconTransport>>,
    fallback: Arc<dyn FallbackTransport>,
}

impl Transport {
    pub fn new(
        endpoint: impl Into<String>,
        beacon: Option<Arc<dyn BeaconTransport>>,
        fallback: Arc<dyn FallbackTransport>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            beacon,
            fallback,
        }
    }

    /// HTTP transport for `endpoint`; the beacon is included when `with_beacon`
    pub fn http(endpoint: impl Into<String>, with_beacon: bool, timeout: Duration) -> Self {
        let client = Client::new();
        let beacon: Option<Arc<dyn BeaconTransport>> = if with_beacon {
            Some(Arc::new(HttpBeacon::new(client.clone())))
        } else {
            None
        };
        Self::new(endpoint, beacon, Arc::new(HttpFallback::new(client, timeout)))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn has_beacon(&self) -> bool {
        self.beacon.is_some()
    }

    /// Send one serialized payload
    ///
    /// Beacon if present (success = accepted for sending), otherwise the
    /// fallback (success = 2xx response).
    pub async fn deliver(&self, body: Vec<u8>) -> Result<Channel, TransportError> {
        if let Some(beacon) = &self.beacon {
            return if beacon.send_beacon(&self.endpoint, body) {
                Ok(Channel::Beacon)
            } else {
                Err(TransportError::Rejected)
            };
        }

        match self.fallback.send_keepalive(&self.endpoint, body).await {
            Ok(()) => Ok(Channel::Fallback),
            Err(e) => {
                warn!("Tracking request failed: {}", e);
                Err(e)
            }
        }
    }
}
