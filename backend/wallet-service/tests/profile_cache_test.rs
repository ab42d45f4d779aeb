//! Integration tests: UserProfileCache and profile patch propagation

mod common;

use common::{eventually, profile, InMemoryProfileStore};
use message_bus::InMemoryBus;
use std::sync::Arc;
use std::time::Duration;
use wallet_service::models::{Chain, ProfilePatch, Thumbnail};
use wallet_service::services::{ProfileCacheConfig, ProfileUpdates, UserProfileCache};
use wallet_service::ServiceError;

fn cache_over(store: Arc<InMemoryProfileStore>, negative_ttl: Duration) -> Arc<UserProfileCache> {
    Arc::new(UserProfileCache::new(
        store,
        ProfileCacheConfig {
            capacity: 1_000,
            negative_ttl,
        },
    ))
}

#[tokio::test]
async fn test_negative_cache_expires() {
    let store = Arc::new(InMemoryProfileStore::new());
    let cache = cache_over(store.clone(), Duration::from_millis(200));

    let err = cache.get_by_username("carol").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert_eq!(store.lookup_calls(), 1);

    store.add_user(profile(3, "carol", "Carol"), vec![]);

    // Still answered from the negative cache
    assert!(cache.get_by_username("carol").await.is_err());
    assert_eq!(store.lookup_calls(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let found = cache.get_by_username("carol").await.unwrap();
    assert_eq!(found.id, 3);
    assert_eq!(store.lookup_calls(), 2);
}

#[tokio::test]
async fn test_read_through_populates_id_and_username() {
    let store = Arc::new(InMemoryProfileStore::new());
    store.add_user(profile(1, "alice", "Alice"), vec![("alice.sol", Chain::Solana)]);
    let cache = cache_over(store.clone(), Duration::from_secs(60));

    cache.get_by_username("alice").await.unwrap();
    cache.get_by_id(1).await.unwrap();
    assert_eq!(store.lookup_calls(), 1);

    // Address keys are only filled on the address path
    cache.get_by_address("alice.sol", Chain::Solana).await.unwrap();
    assert_eq!(store.lookup_calls(), 2);
    cache.get_by_address("alice.sol", Chain::Solana).await.unwrap();
    assert_eq!(store.lookup_calls(), 2);
}

#[tokio::test]
async fn test_patch_applies_only_present_fields() {
    let store = Arc::new(InMemoryProfileStore::new());
    store.add_user(profile(1, "alice", "Alice"), vec![]);
    let cache = cache_over(store.clone(), Duration::from_secs(60));
    let bus = Arc::new(InMemoryBus::new());
    let _subscription = cache.start_listening(bus.as_ref()).await.unwrap();
    let updates = ProfileUpdates::new(bus.clone());

    cache.get_by_id(1).await.unwrap();

    let patch = ProfilePatch {
        thumbnail: Some(Thumbnail {
            uri: "https://img.example.com/a.png".into(),
            blurhash: "LEHV6nWB2yk8".into(),
        }),
        ..Default::default()
    };
    updates.publish(1, &patch).await.unwrap();

    let updated = eventually(Duration::from_secs(1), || {
        let cache = cache.clone();
        async move {
            cache
                .cached_by_id(1)
                .map(|p| p.thumbnail.uri == "https://img.example.com/a.png")
                .unwrap_or(false)
        }
    })
    .await;
    assert!(updated);

    let cached = cache.get_by_username("alice").await.unwrap();
    assert_eq!(cached.display_name, "Alice");
    assert_eq!(cached.username, "alice");
    assert_eq!(cached.thumbnail.blurhash, "LEHV6nWB2yk8");
    assert_eq!(store.lookup_calls(), 1);
}

#[tokio::test]
async fn test_patch_for_uncached_user_is_noop() {
    let store = Arc::new(InMemoryProfileStore::new());
    store.add_user(profile(9, "ivan", "Ivan"), vec![]);
    let cache = cache_over(store.clone(), Duration::from_secs(60));
    let bus = Arc::new(InMemoryBus::new());
    let _subscription = cache.start_listening(bus.as_ref()).await.unwrap();

    let patch = ProfilePatch {
        display_name: Some("Ivan the Great".into()),
        ..Default::default()
    };
    ProfileUpdates::new(bus.clone()).publish(9, &patch).await.unwrap();

    let delivered = eventually(Duration::from_secs(1), || {
        let bus = bus.clone();
        async move { bus.stats().snapshot().messages_received == 1 }
    })
    .await;
    assert!(delivered);

    assert!(cache.cached_by_id(9).is_none());
    assert_eq!(store.lookup_calls(), 0);
    assert_eq!(cache.get_by_id(9).await.unwrap().display_name, "Ivan");
}

#[tokio::test]
async fn test_patch_reaches_every_instance() {
    let store = Arc::new(InMemoryProfileStore::new());
    store.add_user(profile(5, "erin", "Erin"), vec![]);
    let bus = Arc::new(InMemoryBus::new());

    let first = cache_over(store.clone(), Duration::from_secs(60));
    let second = cache_over(store.clone(), Duration::from_secs(60));
    let _s1 = first.start_listening(bus.as_ref()).await.unwrap();
    let _s2 = second.start_listening(bus.as_ref()).await.unwrap();
    first.get_by_id(5).await.unwrap();
    second.get_by_id(5).await.unwrap();

    let patch = ProfilePatch {
        display_name: Some("Erin B".into()),
        ..Default::default()
    };
    ProfileUpdates::new(bus.clone()).publish(5, &patch).await.unwrap();

    for cache in [first, second] {
        let converged = eventually(Duration::from_secs(1), || {
            let cache = cache.clone();
            async move {
                cache
                    .cached_by_id(5)
                    .map(|p| p.display_name == "Erin B")
                    .unwrap_or(false)
            }
        })
        .await;
        assert!(converged);
    }
}

#[tokio::test]
async fn test_lru_evicts_least_recent_user() {
    let store = Arc::new(InMemoryProfileStore::new());
    store.add_user(profile(1, "alice", "Alice"), vec![]);
    store.add_user(profile(2, "bob", "Bob"), vec![]);
    let cache = Arc::new(UserProfileCache::new(
        store.clone(),
        ProfileCacheConfig {
            capacity: 2,
            negative_ttl: Duration::from_secs(60),
        },
    ));

    cache.get_by_id(1).await.unwrap();
    cache.get_by_id(2).await.unwrap();

    assert!(cache.cached_by_id(1).is_none());
    assert!(cache.cached_by_id(2).is_some());
}

#[tokio::test]
async fn test_empty_patch_is_not_published() {
    let bus = Arc::new(InMemoryBus::new());
    ProfileUpdates::new(bus.clone())
        .publish(1, &ProfilePatch::default())
        .await
        .unwrap();
    assert_eq!(bus.stats().snapshot().messages_published, 0);
}
