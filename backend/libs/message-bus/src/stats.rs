//! Statistics tracking for bus traffic

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Point-in-time bus counters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusStats {
    pub messages_published: u64,
    pub messages_received: u64,
    pub handler_errors: u64,
    pub decode_errors: u64,
}

/// Thread-safe statistics collector
#[derive(Clone, Default)]
pub struct StatsCollector {
    messages_published: Arc<AtomicU64>,
    messages_received: Arc<AtomicU64>,
    handler_errors: Arc<AtomicU64>,
    decode_errors: Arc<AtomicU64>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_publish(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_receive(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Handler returned an error
    pub fn record_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Raw transport message could not be turned into a [`crate::BusMessage`]
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BusStats {
        BusStats {
            messages_published: self.messages_published.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.messages_published.store(0, Ordering::Relaxed);
        self.messages_received.store(0, Ordering::Relaxed);
        self.handler_errors.store(0, Ordering::Relaxed);
        self.decode_errors.store(0, Ordering::Relaxed);
    }
}
