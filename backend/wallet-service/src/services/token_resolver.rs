//! Tiered token metadata lookup
//!
//! `get` walks memory, then the store, then the chain's upstream fetcher.
//! Concurrent misses for one key on one instance share a single load through
//! the memory tier's `try_get_with`; a caller dropped mid-load hands the load
//! over to the next waiter and leaves nothing behind.
//!
//! Across instances, creation relies on the store's unique key. Losers of
//! the insert race see `DuplicateWriteConflict`, which `create` absorbs.

use crate::db::TokenStore;
use crate::error::{Result, ServiceError};
use crate::metrics::CacheMetrics;
use crate::models::{Chain, LogoStatus, TokenKey, TokenRecord};
use crate::services::token_fetchers::TokenFetcher;
use dashmap::DashSet;
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct TokenResolverConfig {
    pub memory_ttl: Duration,
    /// Upper bound on one upstream fetch
    pub fetch_timeout: Duration,
}

impl Default for TokenResolverConfig {
    fn default() -> Self {
        Self {
            memory_ttl: Duration::from_secs(60 * 60),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

pub struct TokenResolver {
    memory: Cache<TokenKey, TokenRecord>,
    /// Keys known to exist in the store; process-local
    created: DashSet<TokenKey>,
    store: Arc<dyn TokenStore>,
    fetchers: HashMap<Chain, Arc<dyn TokenFetcher>>,
    config: TokenResolverConfig,
    metrics: CacheMetrics,
}

impl TokenResolver {
    pub fn new(
        store: Arc<dyn TokenStore>,
        fetchers: HashMap<Chain, Arc<dyn TokenFetcher>>,
        config: TokenResolverConfig,
    ) -> Self {
        let memory = Cache::builder().time_to_live(config.memory_ttl).build();

        Self {
            memory,
            created: DashSet::new(),
            store,
            fetchers,
            config,
            metrics: CacheMetrics::new("token"),
        }
    }

    /// Resolve a token, fetching and persisting it on first sight
    pub async fn get(&self, address: &str, chain: Chain) -> Result<TokenRecord> {
        let key = TokenKey::new(address, chain);

        if let Some(token) = self.memory.get(&key).await {
            self.metrics.record_hit();
            debug!(address = %address, chain = %chain, "Token cache hit");
            return Ok(token);
        }
        self.metrics.record_miss();

        self.memory
            .try_get_with(key.clone(), self.resolve_miss(&key))
            .await
            .map_err(unshare)
    }

    /// Store, then upstream. The returned record is inserted by the caller.
    async fn resolve_miss(&self, key: &TokenKey) -> Result<TokenRecord> {
        match self.store.get_token(key).await {
            Ok(Some(token)) => {
                debug!(address = %key.address, chain = %key.chain, "Token loaded from store");
                self.created.insert(key.clone());
                self.metrics.record_write();
                return Ok(token);
            }
            Ok(None) => {}
            Err(e) => {
                self.metrics.record_error(e.kind());
                warn!(
                    address = %key.address,
                    chain = %key.chain,
                    error = %e,
                    "Token store lookup failed"
                );
            }
        }

        let token = self.fetch(key).await.map_err(|e| {
            warn!(
                address = %key.address,
                chain = %key.chain,
                error = %e,
                "Failed to get token from chain"
            );
            ServiceError::NotFound(format!("token {} on {}", key.address, key.chain))
        })?;
        self.metrics.record_write();

        if let Err(e) = self.create(&token).await {
            self.metrics.record_error(e.kind());
            error!(
                address = %key.address,
                chain = %key.chain,
                error = %e,
                "Failed to persist fetched token"
            );
        }

        Ok(token)
    }

    async fn fetch(&self, key: &TokenKey) -> Result<TokenRecord> {
        let fetcher = self
            .fetchers
            .get(&key.chain)
            .ok_or(ServiceError::ChainNotSupported(key.chain))?;

        let timeout = self.config.fetch_timeout;
        let mut token = tokio::time::timeout(timeout, fetcher.fetch_token(&key.address))
            .await
            .map_err(|_| {
                ServiceError::TransientFetch(format!("fetch timed out after {:?}", timeout))
            })??;

        token.address = key.address.clone();
        token.chain = key.chain;
        Ok(token)
    }

    /// Persist a token once
    ///
    /// Succeeds without I/O if this process already saw the key stored, and
    /// treats a unique-key conflict as success.
    pub async fn create(&self, token: &TokenRecord) -> Result<()> {
        let key = token.key();
        if self.created.contains(&key) {
            return Ok(());
        }

        token.validate()?;

        match self.store.insert_token(token).await {
            Ok(()) => {
                debug!(address = %key.address, chain = %key.chain, "Token created");
            }
            Err(ServiceError::DuplicateWriteConflict) => {
                debug!(address = %key.address, chain = %key.chain, "Token already exists");
            }
            Err(e) => return Err(e),
        }

        self.created.insert(key);
        Ok(())
    }

    /// Point the cached copy of a token at its normalized logo
    pub async fn refresh_logo(&self, key: &TokenKey, logo_uri: &str) {
        if let Some(mut token) = self.memory.get(key).await {
            token.logo_uri = logo_uri.to_string();
            token.logo_status = LogoStatus::Handled;
            self.memory.insert(key.clone(), token).await;
        }
    }

    /// Cached copy only; never touches the store
    pub async fn cached(&self, key: &TokenKey) -> Option<TokenRecord> {
        self.memory.get(key).await
    }
}

/// Every caller sharing a failed load gets its own error value
fn unshare(err: Arc<ServiceError>) -> ServiceError {
    match Arc::try_unwrap(err) {
        Ok(err) => err,
        Err(shared) => match shared.as_ref() {
            ServiceError::NotFound(what) => ServiceError::NotFound(what.clone()),
            other => ServiceError::TransientFetch(other.to_string()),
        },
    }
}
