//! Shared test doubles for tracker integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use ma_common::{BatchPayload, ManualClock};
use ma_tracker::storage::{KeyValueStore, MemoryStore};
use ma_tracker::transport::{BeaconTransport, FallbackTransport, Transport};
use ma_tracker::{PageContext, Tracker, TrackerConfig, TrackerDeps, TransportError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const ENDPOINT: &str = "http://collector.test/api/track";
pub const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

/// Beacon that records every accepted payload
pub struct RecordingBeacon {
    accept: bool,
    pub payloads: Mutex<Vec<BatchPayload>>,
}

impl RecordingBeacon {
    fn with(accept: bool) -> Arc<Self> {
        Arc::new(Self {
            accept,
            payloads: Mutex::new(Vec::new()),
        })
    }

    pub fn accepting() -> Arc<Self> {
        Self::with(true)
    }

    pub fn rejecting() -> Arc<Self> {
        Self::with(false)
    }

    pub fn payloads(&self) -> Vec<BatchPayload> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn session_end_count(&self) -> usize {
        self.payloads()
            .iter()
            .flat_map(|p| p.events.iter())
            .filter(|e| e.is_session_end())
            .count()
    }
}

impl BeaconTransport for RecordingBeacon {
    fn send_beacon(&self, _endpoint: &str, body: Vec<u8>) -> bool {
        if !self.accept {
            return false;
        }
        let payload: BatchPayload = serde_json::from_slice(&body).expect("payload is valid JSON");
        self.payloads.lock().unwrap().push(payload);
        true
    }
}

/// Fallback with a fixed result, optionally held open until released
pub struct ScriptedFallback {
    ok: bool,
    gate: Option<Arc<Notify>>,
    pub calls: AtomicUsize,
    pub payloads: Mutex<Vec<BatchPayload>>,
}

impl ScriptedFallback {
    fn with(ok: bool, gate: Option<Arc<Notify>>) -> Arc<Self> {
        Arc::new(Self {
            ok,
            gate,
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::with(true, None)
    }

    pub fn failing() -> Arc<Self> {
        Self::with(false, None)
    }

    /// Held until `gate` is notified, then succeeds
    pub fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Self::with(true, Some(gate))
    }

    /// Held until `gate` is notified, then fails
    pub fn gated_failing(gate: Arc<Notify>) -> Arc<Self> {
        Self::with(false, Some(gate))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<BatchPayload> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl FallbackTransport for ScriptedFallback {
    async fn send_keepalive(&self, _endpoint: &str, body: Vec<u8>) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if !self.ok {
            return Err(TransportError::Status(503));
        }
        let payload: BatchPayload = serde_json::from_slice(&body).expect("payload is valid JSON");
        self.payloads.lock().unwrap().push(payload);
        Ok(())
    }
}

/// Durable + tab stores shared across page views of one "browser"
pub struct Browser {
    pub clock: Arc<ManualClock>,
    pub durable: Arc<MemoryStore>,
    pub tab: Arc<MemoryStore>,
}

impl Browser {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::at_millis(1_760_000_000_000));
        Self {
            durable: Arc::new(MemoryStore::new(clock.clone())),
            tab: Arc::new(MemoryStore::new(clock.clone())),
            clock,
        }
    }

    pub fn deps(&self, transport: Transport) -> TrackerDeps {
        TrackerDeps {
            durable: self.durable.clone() as Arc<dyn KeyValueStore>,
            tab: self.tab.clone() as Arc<dyn KeyValueStore>,
            transport,
            clock: self.clock.clone(),
        }
    }

    /// New page view at `url` using the given transport
    pub fn open(&self, url: &str, config: TrackerConfig, transport: Transport) -> Tracker {
        Tracker::new(config, page(url), self.deps(transport))
    }

    /// New page view with default configuration
    pub fn visit(&self, url: &str, transport: Transport) -> Tracker {
        self.open(url, TrackerConfig::default(), transport)
    }

    /// Same durable store and clock, fresh tab store
    pub fn new_tab(&self) -> Browser {
        Browser {
            clock: self.clock.clone(),
            durable: self.durable.clone(),
            tab: Arc::new(MemoryStore::new(self.clock.clone())),
        }
    }
}

pub fn page(url: &str) -> PageContext {
    PageContext {
        url: url.to_string(),
        title: "Shop".to_string(),
        referrer: "https://m.facebook.com/".to_string(),
        screen_width: 390,
        screen_height: 844,
        user_agent: IPHONE_UA.to_string(),
    }
}

pub fn beacon_transport(beacon: Arc<RecordingBeacon>) -> Transport {
    let beacon: Arc<dyn BeaconTransport> = beacon;
    Transport::new(ENDPOINT, Some(beacon), ScriptedFallback::succeeding())
}

pub fn fallback_transport(fallback: Arc<ScriptedFallback>) -> Transport {
    Transport::new(ENDPOINT, None, fallback)
}
