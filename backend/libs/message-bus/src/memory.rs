//! In-process transport
//!
//! Same semantics as [`crate::RedisBus`] without the network hop. Several
//! service instances in one process can share a single `InMemoryBus` to
//! exercise cross-instance behavior.

use crate::topic::{pattern_matches, validate_pattern, validate_topic};
use crate::{dispatch, BusMessage, MessageBus, MessageHandler, Result, StatsCollector, Subscription};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

struct Subscriber {
    id: u64,
    pattern: String,
    sender: mpsc::UnboundedSender<BusMessage>,
}

#[derive(Default)]
struct Inner {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    stats: StatsCollector,
}

#[derive(Clone, Default)]
pub struct InMemoryBus {
    inner: Arc<Inner>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &StatsCollector {
        &self.inner.stats
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .iter()
            .filter(|s| !s.sender.is_closed())
            .count()
    }

    fn remove(&self, id: u64) {
        self.inner.subscribers.write().retain(|s| s.id != id);
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        validate_topic(topic)?;

        let mut delivered = 0usize;
        let mut closed = false;
        {
            let subscribers = self.inner.subscribers.read();
            for sub in subscribers.iter().filter(|s| pattern_matches(&s.pattern, topic)) {
                if sub.sender.send(BusMessage::new(topic, payload.clone())).is_ok() {
                    delivered += 1;
                } else {
                    closed = true;
                }
            }
        }

        if closed {
            self.inner.subscribers.write().retain(|s| !s.sender.is_closed());
        }

        self.inner.stats.record_publish();
        debug!(topic = %topic, receivers = delivered, "Published message");
        Ok(())
    }

    async fn subscribe(&self, pattern: &str, handler: MessageHandler) -> Result<Subscription> {
        validate_pattern(pattern)?;

        let (sender, mut receiver) = mpsc::unbounded_channel::<BusMessage>();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().push(Subscriber {
            id,
            pattern: pattern.to_string(),
            sender,
        });

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let bus = self.clone();
        let stats = self.inner.stats.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    next = receiver.recv() => {
                        match next {
                            Some(msg) => dispatch(&handler, msg, &stats).await,
                            None => break,
                        }
                    }
                }
            }
            bus.remove(id);
        });

        Ok(Subscription::new(pattern.to_string(), shutdown_tx, handle))
    }
}
