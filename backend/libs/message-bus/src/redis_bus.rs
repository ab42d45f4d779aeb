//! Redis Pub/Sub transport

use crate::topic::{is_wildcard, validate_pattern, validate_topic};
use crate::{dispatch, BusMessage, MessageBus, MessageHandler, Result, StatsCollector, Subscription};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Bus backed by Redis PUBLISH / (P)SUBSCRIBE
///
/// Publishing shares one multiplexed connection; every subscription opens
/// its own dedicated pub/sub connection.
#[derive(Clone)]
pub struct RedisBus {
    client: Client,
    publisher: ConnectionManager,
    stats: StatsCollector,
}

impl RedisBus {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;

        info!("Connected message bus to Redis");

        Ok(Self {
            client,
            publisher,
            stats: StatsCollector::new(),
        })
    }

    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        validate_topic(topic)?;

        let mut conn = self.publisher.clone();
        let receivers: usize = conn.publish(topic, payload).await?;
        self.stats.record_publish();

        debug!(topic = %topic, receivers = receivers, "Published message");
        Ok(())
    }

    async fn subscribe(&self, pattern: &str, handler: MessageHandler) -> Result<Subscription> {
        validate_pattern(pattern)?;

        let mut pubsub = self.client.get_async_pubsub().await?;
        if is_wildcard(pattern) {
            pubsub.psubscribe(pattern).await?;
        } else {
            pubsub.subscribe(pattern).await?;
        }

        info!(pattern = %pattern, "Subscribed to bus");

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let stats = self.stats.clone();
        let task_pattern = pattern.to_string();

        let handle = tokio::spawn(async move {
            let mut stream = pubsub.on_message();

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    next = stream.next() => {
                        let Some(msg) = next else {
                            warn!(pattern = %task_pattern, "Bus subscription stream ended");
                            break;
                        };

                        let payload = match msg.get_payload::<Vec<u8>>() {
                            Ok(p) => p,
                            Err(e) => {
                                stats.record_decode_error();
                                error!(
                                    pattern = %task_pattern,
                                    error = ?e,
                                    "Failed to read message payload"
                                );
                                continue;
                            }
                        };

                        let message = BusMessage::new(msg.get_channel_name(), payload);
                        dispatch(&handler, message, &stats).await;
                    }
                }
            }

            debug!(pattern = %task_pattern, "Bus listener stopped");
        });

        Ok(Subscription::new(pattern.to_string(), shutdown_tx, handle))
    }
}
