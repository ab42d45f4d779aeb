//! Topic based publish/subscribe bus
//!
//! Keeps per-instance caches loosely coherent across every running server.
//!
//! # Architecture
//!
//! ```text
//! Instance A:
//!   1. Persist the authoritative change
//!   2. PUBLISH user.update.sync.42 {"name": "Robert"}
//!      ↓
//! Bus (broadcast to every subscriber)
//!      ↓
//! Instance A, B, C:
//!   3. PSUBSCRIBE user.update.sync.* receives the message
//!   4. Handler patches the local cache entry in place
//! ```
//!
//! Delivery is at-least-once per live subscription and unordered across
//! publishers. Messages published while a subscriber is disconnected are lost.
//!
//! # Example
//!
//! ```no_run
//! use message_bus::{handler, MessageBus, RedisBus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), message_bus::BusError> {
//!     let bus = RedisBus::connect("redis://localhost:6379").await?;
//!
//!     let subscription = bus
//!         .subscribe(
//!             "user.update.sync.*",
//!             handler(|msg| async move {
//!                 println!("{} -> {} bytes", msg.topic, msg.payload.len());
//!                 Ok(())
//!             }),
//!         )
//!         .await?;
//!
//!     bus.publish("user.update.sync.42", b"{}".to_vec()).await?;
//!
//!     subscription.unsubscribe().await;
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

mod error;
mod memory;
mod redis_bus;
mod stats;
pub mod topic;

pub use error::BusError;
pub use memory::InMemoryBus;
pub use redis_bus::RedisBus;
pub use stats::{BusStats, StatsCollector};

pub type Result<T> = std::result::Result<T, BusError>;

/// A message delivered to a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Concrete topic the message was published on (never a pattern)
    pub topic: String,
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Decode a JSON payload
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Callback invoked for every message matching a subscription
pub type MessageHandler = Arc<dyn Fn(BusMessage) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Wrap an async closure into a [`MessageHandler`]
pub fn handler<F, Fut>(callback: F) -> MessageHandler
where
    F: Fn(BusMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |msg| Box::pin(callback(msg)))
}

/// Publish/subscribe transport
///
/// Patterns ending in `*` match every topic sharing the prefix before it;
/// any other pattern matches exactly one topic.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a payload to every current subscriber of `topic`
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Register `handler` for every topic matching `pattern`
    ///
    /// Messages of one subscription are handled one at a time, in the order
    /// they were received.
    async fn subscribe(&self, pattern: &str, handler: MessageHandler) -> Result<Subscription>;
}

/// Handle to a running subscription
///
/// Dropping the handle signals the listener task to stop; call
/// [`Subscription::unsubscribe`] to also wait for it.
pub struct Subscription {
    pattern: String,
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn new(
        pattern: String,
        shutdown: watch::Sender<bool>,
        handle: JoinHandle<()>,
    ) -> Self {
        Self {
            pattern,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Stop listening and wait for the listener task to exit
    pub async fn unsubscribe(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(pattern = %self.pattern, error = ?e, "Subscription task panicked");
                }
            }
        }
        debug!(pattern = %self.pattern, "Unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Run one handler invocation, recording the outcome
pub(crate) async fn dispatch(handler: &MessageHandler, msg: BusMessage, stats: &StatsCollector) {
    stats.record_receive();
    let topic = msg.topic.clone();
    if let Err(e) = handler(msg).await {
        stats.record_error();
        error!(topic = %topic, error = %e, "Message handler failed");
    }
}
