//! User profile read-through cache
//!
//! One LRU holds three keyspaces: `id:<id>`, `username:<name>` and
//! `address:<address>:<chain>`. Keys filled from the same store row share a
//! single `Arc<RwLock<_>>`, so a patch applied through the id entry is seen
//! through every alias of that user.
//!
//! Known limitation: after a username change the `username:<old>` key keeps
//! resolving (to the updated profile) until it is evicted.

use crate::db::ProfileStore;
use crate::error::{Result, ServiceError};
use crate::metrics::CacheMetrics;
use crate::models::{Chain, ProfilePatch, UserProfileSummary};
use lru::LruCache;
use message_bus::topic::{build_topic, prefix_pattern, topic_suffix};
use message_bus::{handler, BusMessage, MessageBus, Subscription};
use moka::future::Cache;
use parking_lot::{Mutex, RwLock};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Topics are `user.update.sync.<user id>`
pub const PROFILE_SYNC_PREFIX: &str = "user.update.sync";

#[derive(Debug, Clone)]
pub struct ProfileCacheConfig {
    pub capacity: usize,
    pub negative_ttl: Duration,
}

impl Default for ProfileCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            negative_ttl: Duration::from_secs(15 * 60),
        }
    }
}

type SharedProfile = Arc<RwLock<UserProfileSummary>>;

fn id_key(id: i64) -> String {
    format!("id:{}", id)
}

fn username_key(username: &str) -> String {
    format!("username:{}", username)
}

fn address_key(address: &str, chain: Chain) -> String {
    format!("address:{}:{}", address, chain)
}

enum Lookup<'a> {
    Id(i64),
    Username(&'a str),
    Address(&'a str, Chain),
}

impl Lookup<'_> {
    fn cache_key(&self) -> String {
        match self {
            Lookup::Id(id) => id_key(*id),
            Lookup::Username(username) => username_key(username),
            Lookup::Address(address, chain) => address_key(address, *chain),
        }
    }
}

pub struct UserProfileCache {
    entries: Mutex<LruCache<String, SharedProfile>>,
    negative: Cache<String, ()>,
    store: Arc<dyn ProfileStore>,
    metrics: CacheMetrics,
}

impl UserProfileCache {
    pub fn new(store: Arc<dyn ProfileStore>, config: ProfileCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            negative: Cache::builder().time_to_live(config.negative_ttl).build(),
            store,
            metrics: CacheMetrics::new("profile"),
        }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<UserProfileSummary> {
        self.read_through(Lookup::Id(id)).await
    }

    pub async fn get_by_username(&self, username: &str) -> Result<UserProfileSummary> {
        self.read_through(Lookup::Username(username)).await
    }

    pub async fn get_by_address(&self, address: &str, chain: Chain) -> Result<UserProfileSummary> {
        self.read_through(Lookup::Address(address, chain)).await
    }

    async fn read_through(&self, lookup: Lookup<'_>) -> Result<UserProfileSummary> {
        let key = lookup.cache_key();

        if self.negative.get(&key).await.is_some() {
            self.metrics.record_negative_hit();
            return Err(ServiceError::NotFound(key));
        }

        let cached = self.entries.lock().get(&key).cloned();
        if let Some(shared) = cached {
            self.metrics.record_hit();
            return Ok(shared.read().clone());
        }
        self.metrics.record_miss();

        let found = match &lookup {
            Lookup::Id(id) => self.store.profile_by_id(*id).await?,
            Lookup::Username(username) => self.store.profile_by_username(username).await?,
            Lookup::Address(address, chain) => {
                self.store.profile_by_address(address, *chain).await?
            }
        };

        match found {
            Some(profile) => {
                let address = match lookup {
                    Lookup::Address(..) => Some(key),
                    _ => None,
                };
                self.populate(&profile, address).await;
                Ok(profile)
            }
            None => {
                debug!(key = %key, "Profile not found, caching absence");
                self.negative.insert(key.clone(), ()).await;
                Err(ServiceError::NotFound(key))
            }
        }
    }

    async fn populate(&self, profile: &UserProfileSummary, address: Option<String>) {
        let mut keys = vec![id_key(profile.id), username_key(&profile.username)];
        {
            let mut entries = self.entries.lock();
            let shared = match entries.peek(&keys[0]).cloned() {
                Some(existing) => {
                    *existing.write() = profile.clone();
                    existing
                }
                None => Arc::new(RwLock::new(profile.clone())),
            };
            entries.put(keys[0].clone(), shared.clone());
            entries.put(keys[1].clone(), shared.clone());
            if let Some(address) = &address {
                entries.put(address.clone(), shared);
            }
        }
        self.metrics.record_write();

        keys.extend(address);
        for key in &keys {
            self.negative.invalidate(key).await;
        }
    }

    /// Merge a patch into the cached profile, returning whether it was cached
    ///
    /// Does not refresh the entry's LRU position.
    pub fn apply_patch(&self, user_id: i64, patch: &ProfilePatch) -> bool {
        let shared = self.entries.lock().peek(&id_key(user_id)).cloned();
        match shared {
            Some(shared) => {
                patch.apply_to(&mut shared.write());
                self.metrics.record_invalidation();
                true
            }
            None => false,
        }
    }

    /// Cached copy by id, without touching the store or LRU order
    pub fn cached_by_id(&self, id: i64) -> Option<UserProfileSummary> {
        self.entries
            .lock()
            .peek(&id_key(id))
            .map(|shared| shared.read().clone())
    }

    fn handle_sync_message(&self, msg: &BusMessage) -> message_bus::Result<()> {
        let user_id = topic_suffix(PROFILE_SYNC_PREFIX, &msg.topic)
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|id| *id > 0);
        let Some(user_id) = user_id else {
            debug!(topic = %msg.topic, "Ignoring profile sync for invalid user id");
            return Ok(());
        };

        let patch: ProfilePatch = msg.json()?;
        if self.apply_patch(user_id, &patch) {
            debug!(user_id = user_id, "Applied profile patch");
        }
        Ok(())
    }

    /// Subscribe to profile patches published by any instance
    pub async fn start_listening(self: &Arc<Self>, bus: &dyn MessageBus) -> Result<Subscription> {
        let cache = Arc::clone(self);
        let pattern = prefix_pattern(PROFILE_SYNC_PREFIX);
        let subscription = bus
            .subscribe(
                &pattern,
                handler(move |msg| {
                    let result = cache.handle_sync_message(&msg);
                    async move { result }
                }),
            )
            .await?;

        info!(pattern = %pattern, "Profile cache listening for updates");
        Ok(subscription)
    }
}

/// Write side of profile coherence
///
/// Call after the profile row is persisted; every instance, this one
/// included, patches its cached copy when the message arrives.
#[derive(Clone)]
pub struct ProfileUpdates {
    bus: Arc<dyn MessageBus>,
}

impl ProfileUpdates {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }

    pub async fn publish(&self, user_id: i64, patch: &ProfilePatch) -> Result<()> {
        if user_id <= 0 {
            return Err(ServiceError::Validation(format!("invalid user id {}", user_id)));
        }
        if patch.is_empty() {
            return Ok(());
        }

        let payload = serde_json::to_vec(patch)?;
        self.bus
            .publish(&build_topic(PROFILE_SYNC_PREFIX, user_id), payload)
            .await?;
        Ok(())
    }
}
