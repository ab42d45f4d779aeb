//! Integration tests for the message bus
//!
//! The Redis tests require a running Redis instance.
//! Run with: cargo test -p message-bus --test integration_test -- --ignored

use message_bus::{handler, BusMessage, InMemoryBus, MessageBus, RedisBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const REDIS_URL: &str = "redis://127.0.0.1:6379";

fn collector() -> (Arc<Mutex<Vec<BusMessage>>>, message_bus::MessageHandler) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let h = handler(move |msg| {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock().await.push(msg);
            Ok(())
        }
    });
    (received, h)
}

async fn wait_for(received: &Arc<Mutex<Vec<BusMessage>>>, count: usize) {
    for _ in 0..50 {
        if received.lock().await.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_in_memory_fan_out_to_every_subscriber() {
    let bus = InMemoryBus::new();
    let (first, h1) = collector();
    let (second, h2) = collector();

    let _s1 = bus.subscribe("server.signatures", h1).await.unwrap();
    let _s2 = bus.subscribe("server.signatures", h2).await.unwrap();

    bus.publish("server.signatures", b"abc".to_vec()).await.unwrap();

    wait_for(&first, 1).await;
    wait_for(&second, 1).await;

    assert_eq!(first.lock().await[0].payload, b"abc".to_vec());
    assert_eq!(second.lock().await[0].payload, b"abc".to_vec());
}

#[tokio::test]
async fn test_in_memory_preserves_order_per_subscription() {
    let bus = InMemoryBus::new();
    let (received, h) = collector();
    let _sub = bus.subscribe("user.update.sync.*", h).await.unwrap();

    for id in 1..=5 {
        bus.publish(&format!("user.update.sync.{}", id), vec![]).await.unwrap();
    }

    wait_for(&received, 5).await;
    let topics: Vec<String> = received.lock().await.iter().map(|m| m.topic.clone()).collect();
    assert_eq!(
        topics,
        (1..=5).map(|id| format!("user.update.sync.{}", id)).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_in_memory_no_delivery_after_unsubscribe() {
    let bus = InMemoryBus::new();
    let (received, h) = collector();
    let sub = bus.subscribe("server.signatures", h).await.unwrap();
    sub.unsubscribe().await;

    bus.publish("server.signatures", b"late".to_vec()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(received.lock().await.is_empty());
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_redis_pattern_subscription() {
    let bus = RedisBus::connect(REDIS_URL).await.expect("Failed to connect");
    let (received, h) = collector();

    let sub = bus
        .subscribe("user.update.sync.*", h)
        .await
        .expect("Failed to subscribe");

    // Give subscriber time to connect
    tokio::time::sleep(Duration::from_millis(100)).await;

    bus.publish("user.update.sync.42", br#"{"name":"Bob"}"#.to_vec())
        .await
        .expect("Failed to publish");

    wait_for(&received, 1).await;

    let messages = received.lock().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].topic, "user.update.sync.42");
    drop(messages);

    sub.unsubscribe().await;
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_redis_literal_subscription_ignores_other_topics() {
    let bus = RedisBus::connect(REDIS_URL).await.expect("Failed to connect");
    let (received, h) = collector();

    let _sub = bus
        .subscribe("server.signatures", h)
        .await
        .expect("Failed to subscribe");
    tokio::time::sleep(Duration::from_millis(100)).await;

    bus.publish("server.other", b"x".to_vec()).await.unwrap();
    bus.publish("server.signatures", b"sig".to_vec()).await.unwrap();

    wait_for(&received, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let messages = received.lock().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload, b"sig".to_vec());
}
