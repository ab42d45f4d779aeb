//! Cross-instance replay protection for signed requests
//!
//! A signature is "used" once any instance calls `notify` for it, until the
//! TTL lapses. Propagation goes over the bus, so two instances can both
//! accept the same signature inside the publish/deliver window.

use crate::error::Result;
use message_bus::{handler, BusError, MessageBus, Subscription};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const SIGNATURES_TOPIC: &str = "server.signatures";

#[derive(Debug, Clone)]
pub struct ReplayGuardConfig {
    pub ttl: Duration,
}

impl Default for ReplayGuardConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15),
        }
    }
}

pub struct ReplayGuard {
    used: Cache<String, ()>,
    bus: Arc<dyn MessageBus>,
}

impl ReplayGuard {
    pub fn new(bus: Arc<dyn MessageBus>, config: ReplayGuardConfig) -> Self {
        Self {
            used: Cache::builder().time_to_live(config.ttl).build(),
            bus,
        }
    }

    /// Subscribe to signatures consumed on other instances
    pub async fn start(self: &Arc<Self>) -> Result<Subscription> {
        let guard = Arc::clone(self);
        let subscription = self
            .bus
            .subscribe(
                SIGNATURES_TOPIC,
                handler(move |msg| {
                    let guard = Arc::clone(&guard);
                    async move {
                        let signature = String::from_utf8(msg.payload).map_err(|e| {
                            BusError::InvalidMessage(format!("signature is not utf-8: {}", e))
                        })?;
                        guard.used.insert(signature, ()).await;
                        Ok(())
                    }
                }),
            )
            .await?;

        info!(topic = SIGNATURES_TOPIC, "Replay guard listening for signatures");
        Ok(subscription)
    }

    pub async fn is_signature_used(&self, signature: &str) -> bool {
        self.used.get(signature).await.is_some()
    }

    /// Mark a signature used here, then tell every other instance
    pub async fn notify(&self, signature: &str) -> Result<()> {
        self.used.insert(signature.to_string(), ()).await;
        self.bus
            .publish(SIGNATURES_TOPIC, signature.as_bytes().to_vec())
            .await?;
        debug!("Signature broadcast");
        Ok(())
    }
}
