//! In-memory event queue
//!
//! Insertion-ordered and owned by one tracker. Events leave the queue only
//! when a delivery of the batch they were part of is reported successful, or
//! when they have failed `max_attempts` deliveries.

use crate::transport::Channel;
use ma_common::TelemetryEvent;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::warn;

/// Queued event with its failed-delivery count
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    pub event: TelemetryEvent,
    pub attempts: u32,
}

/// Result of one flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing queued
    Empty,
    /// Another flush was already sending; nothing done
    InFlight,
    /// Batch handed off successfully and removed from the queue
    Delivered { count: usize, channel: Channel },
    /// Batch handed to the fallback request; the queue is settled when the
    /// response arrives
    Dispatched { count: usize },
    /// Delivery failed; `count` events kept for the next flush, `dropped`
    /// events exceeded the attempt limit
    Retained { count: usize, dropped: usize },
}

pub struct EventQueue {
    events: Mutex<VecDeque<QueuedEvent>>,
    /// 0 = unbounded
    max_attempts: u32,
}

impl EventQueue {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            max_attempts,
        }
    }

    /// Append unconditionally (no dedup, no cap)
    pub async fn push(&self, event: TelemetryEvent) {
        self.events
            .lock()
            .await
            .push_back(QueuedEvent { event, attempts: 0 });
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }

    /// Copy of every queued event, in insertion order
    pub async fn snapshot(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .await
            .iter()
            .map(|queued| queued.event.clone())
            .collect()
    }

    /// Copy of the queue including attempt counts
    pub async fn entries(&self) -> Vec<QueuedEvent> {
        self.events.lock().await.iter().cloned().collect()
    }

    /// Remove the first `count` events (the delivered batch)
    pub async fn acknowledge(&self, count: usize) {
        let mut events = self.events.lock().await;
        let count = count.min(events.len());
        events.drain(..count);
    }

    /// Count a failed delivery against the first `count` events
    ///
    /// Returns how many of them were dropped for reaching the attempt limit.
    pub async fn record_failure(&self, count: usize) -> usize {
        let mut events = self.events.lock().await;
        let count = count.min(events.len());
        for queued in events.iter_mut().take(count) {
            queued.attempts = queued.attempts.saturating_add(1);
        }

        if self.max_attempts == 0 {
            return 0;
        }

        let before = events.len();
        let max_attempts = self.max_attempts;
        events.retain(|queued| queued.attempts < max_attempts);
        let dropped = before - events.len();
        if dropped > 0 {
            warn!(
                "Dropped {} event(s) after {} failed deliveries",
                dropped, max_attempts
            );
        }
        dropped
    }
}
