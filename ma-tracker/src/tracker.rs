//! Page-level tracking instance
//!
//! One [`Tracker`] per page view. Construction resolves visitor and session
//! ids; [`Tracker::track_page_view`] resolves attribution and queues the
//! pageview; the queue is flushed on an interval ([`Tracker::spawn_flush_loop`])
//! and at teardown ([`Tracker::teardown`]).
//!
//! A beacon send settles immediately. A fallback send runs as a spawned task
//! that settles the queue when the response arrives; [`Tracker::settle`]
//! waits for those tasks.

use crate::attribution::extract_attribution;
use crate::bridge::{AttributionBridge, AttributionOrigin, ResolvedAttribution};
use crate::config::TrackerConfig;
use crate::content_cache::ContentCache;
use crate::device;
use crate::identity::IdentityManager;
use crate::lifecycle::{SessionCloser, TeardownSignal};
use crate::queue::{EventQueue, FlushOutcome};
use crate::storage::{build_durable_store, build_tab_store, KeyValueStore};
use crate::error::TransportError;
use crate::transport::{Channel, Transport};
use ma_common::{BatchPayload, Clock, PageView, SystemClock, TelemetryEvent};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What the host page knows about the current navigation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContext {
    pub url: String,
    pub title: String,
    pub referrer: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub user_agent: String,
}

/// Injected collaborators
pub struct TrackerDeps {
    /// Visitor/session ids and the content cache
    pub durable: Arc<dyn KeyValueStore>,
    /// Saved attribution set
    pub tab: Arc<dyn KeyValueStore>,
    pub transport: Transport,
    pub clock: Arc<dyn Clock>,
}

impl TrackerDeps {
    /// Stores and HTTP transport built from configuration, wall clock
    pub fn from_config(config: &TrackerConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            durable: build_durable_store(&config.storage, clock.clone()),
            tab: build_tab_store(&config.storage, clock.clone()),
            transport: Transport::http(
                config.api_url.clone(),
                config.transport.beacon,
                config.request_timeout(),
            ),
            clock,
        }
    }
}

pub struct Tracker {
    config: TrackerConfig,
    page: PageContext,
    visitor_id: String,
    session_id: String,
    identity: IdentityManager,
    bridge: AttributionBridge,
    content_cache: ContentCache,
    queue: Arc<EventQueue>,
    transport: Transport,
    clock: Arc<dyn Clock>,
    flushing: Arc<AtomicBool>,
    session_closer: SessionCloser,
    /// Fallback sends not yet joined by `settle`
    pending: Mutex<Vec<JoinHandle<()>>>,
    /// Outcome of the latest fallback batch delivery to complete
    last_delivery: Arc<Mutex<Option<FlushOutcome>>>,
}

/// Clears the in-flight flag when the delivery ends, however it ends
///
/// Owned so it can move into a spawned fallback send.
struct FlushGuard(Arc<AtomicBool>);

impl FlushGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Apply a delivery result to the first `count` queued events
async fn settle_batch(
    queue: &EventQueue,
    count: usize,
    result: Result<Channel, TransportError>,
) -> FlushOutcome {
    match result {
        Ok(channel) => {
            queue.acknowledge(count).await;
            debug!("Flushed {} event(s) via {}", count, channel);
            FlushOutcome::Delivered { count, channel }
        }
        Err(e) => {
            let dropped = queue.record_failure(count).await;
            warn!("Batch of {} event(s) not delivered, kept for next flush: {}", count, e);
            FlushOutcome::Retained {
                count: count - dropped,
                dropped,
            }
        }
    }
}

impl Tracker {
    pub fn new(config: TrackerConfig, page: PageContext, deps: TrackerDeps) -> Self {
        let identity = IdentityManager::new(
            deps.durable.clone(),
            config.visitor_key.clone(),
            config.session_key.clone(),
            config.visitor_lifetime(),
            config.session_timeout(),
        );
        let visitor_id = identity.get_or_create_visitor_id();
        let session_id = identity.get_or_create_session_id();

        let bridge = AttributionBridge::new(deps.tab, config.attribution_key.clone());
        let content_cache = ContentCache::new(
            deps.durable,
            config.content_cache_key.clone(),
            config.content_cache_capacity,
        );
        let queue = Arc::new(EventQueue::new(config.max_flush_attempts));

        info!(
            "Tracker initialized for site {} (visitor {}, session {})",
            config.site_id, visitor_id, session_id
        );

        Self {
            config,
            page,
            visitor_id,
            session_id,
            identity,
            bridge,
            content_cache,
            queue,
            transport: deps.transport,
            clock: deps.clock,
            flushing: Arc::new(AtomicBool::new(false)),
            session_closer: SessionCloser::new(),
            pending: Mutex::new(Vec::new()),
            last_delivery: Arc::new(Mutex::new(None)),
        }
    }

    /// Tracker with stores and transport built from `config`
    pub fn from_config(config: TrackerConfig, page: PageContext) -> Self {
        let deps = TrackerDeps::from_config(&config);
        Self::new(config, page, deps)
    }

    pub fn visitor_id(&self) -> &str {
        &self.visitor_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Attribution for this page view (URL, else saved copy, else empty)
    ///
    /// An empty or missing `utm_content` on the URL is filled from the
    /// content cache by `utm_id` before the URL set is judged complete.
    pub fn resolve_attribution(&self) -> ResolvedAttribution {
        let mut fresh = extract_attribution(&self.page.url, &self.config.attribution_prefix);
        self.content_cache.apply(&mut fresh);

        let mut resolved = self.bridge.resolve(fresh);
        if resolved.origin == AttributionOrigin::Restored {
            self.content_cache.apply(&mut resolved.set);
        }
        resolved
    }

    /// Queue a pageview for the current page
    pub async fn track_page_view(&self) {
        let resolved = self.resolve_attribution();
        debug!("Pageview attribution origin: {:?}", resolved.origin);

        let view = PageView {
            url: self.page.url.clone(),
            title: self.page.title.clone(),
            referrer: self.page.referrer.clone(),
            screen_width: self.page.screen_width,
            screen_height: self.page.screen_height,
            device_type: device::device_type(&self.page.user_agent),
            user_agent: self.page.user_agent.clone(),
            in_app: device::is_in_app_browser(&self.page.user_agent),
            attribution: resolved.set,
        };
        let event = TelemetryEvent::page_view(
            &self.visitor_id,
            &self.session_id,
            self.clock.now_millis(),
            view,
        );
        self.enqueue(event).await;
    }

    /// Queue a custom event; `data` cannot override the identity fields
    pub async fn track_event(&self, name: &str, data: Map<String, Value>) {
        let event = TelemetryEvent::custom(
            name,
            &self.visitor_id,
            &self.session_id,
            self.clock.now_millis(),
            data,
        );
        self.enqueue(event).await;
    }

    async fn enqueue(&self, event: TelemetryEvent) {
        if self.config.sliding_session {
            self.identity.refresh_session(&self.session_id);
        }
        self.queue.push(event).await;
    }

    pub async fn queued_events(&self) -> Vec<TelemetryEvent> {
        self.queue.snapshot().await
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.len().await
    }

    /// Send everything queued as one batch
    ///
    /// No-op when the queue is empty or another delivery is in flight. With
    /// a beacon the outcome is final on return. Without one the request is
    /// spawned and `Dispatched` returned at once; the queue is settled when
    /// the response arrives. Only the events of the sent batch are removed
    /// on success; on failure they stay queued (minus those that reached the
    /// attempt limit).
    pub async fn flush(&self) -> FlushOutcome {
        let Some(guard) = FlushGuard::acquire(&self.flushing) else {
            debug!("Flush already in flight");
            return FlushOutcome::InFlight;
        };

        let events = self.queue.snapshot().await;
        if events.is_empty() {
            return FlushOutcome::Empty;
        }
        let count = events.len();

        let body = match BatchPayload::new(self.config.site_id.clone(), events).to_json_bytes() {
            Ok(body) => body,
            Err(e) => {
                warn!("Cannot serialize batch: {}", e);
                let dropped = self.queue.record_failure(count).await;
                return FlushOutcome::Retained {
                    count: count - dropped,
                    dropped,
                };
            }
        };

        if self.transport.has_beacon() {
            let result = self.transport.deliver(body).await;
            return settle_batch(&self.queue, count, result).await;
        }

        let queue = Arc::clone(&self.queue);
        let transport = self.transport.clone();
        let last_delivery = Arc::clone(&self.last_delivery);
        let handle = tokio::spawn(async move {
            let _guard = guard;
            let result = transport.deliver(body).await;
            let outcome = settle_batch(&queue, count, result).await;
            *last_delivery.lock().await = Some(outcome);
        });
        self.track(handle).await;
        FlushOutcome::Dispatched { count }
    }

    /// Wait for every spawned fallback send
    ///
    /// Returns the outcome of the latest batch delivery completed since the
    /// previous call, if any.
    pub async fn settle(&self) -> Option<FlushOutcome> {
        let handles = std::mem::take(&mut *self.pending.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Delivery task failed: {}", e);
            }
        }
        self.last_delivery.lock().await.take()
    }

    async fn track(&self, handle: JoinHandle<()>) {
        let mut pending = self.pending.lock().await;
        pending.retain(|task| !task.is_finished());
        pending.push(handle);
    }

    /// Handle a page-exit signal
    ///
    /// The first signal sends `session_end` on its own, ahead of and
    /// independent from the batch; every signal then flushes. Neither send
    /// is waited on beyond the beacon hand-off.
    pub async fn teardown(&self, signal: TeardownSignal) -> FlushOutcome {
        if self.session_closer.claim() {
            debug!("Closing session on {}", signal);
            self.send_session_end().await;
        } else {
            debug!("Session already closed, {} only flushes", signal);
        }
        self.flush().await
    }

    async fn send_session_end(&self) {
        let event = TelemetryEvent::session_end(
            &self.visitor_id,
            &self.session_id,
            self.clock.now_millis(),
        );
        let payload = BatchPayload::new(self.config.site_id.clone(), vec![event]);
        let body = match payload.to_json_bytes() {
            Ok(body) => body,
            Err(e) => {
                warn!("Cannot serialize session_end: {}", e);
                return;
            }
        };

        if self.transport.has_beacon() {
            if let Err(e) = self.transport.deliver(body).await {
                warn!("session_end not delivered: {}", e);
            }
            return;
        }

        let transport = self.transport.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = transport.deliver(body).await {
                warn!("session_end not delivered: {}", e);
            }
        });
        self.track(handle).await;
    }

    /// Flush every `batch_interval_ms` until the returned task is aborted
    pub fn spawn_flush_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        let period = self.config.batch_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tracker.flush().await;
            }
        })
    }
}
