//! Batched, rate-limited token price cache
//!
//! Every address asked for becomes "interesting" and is re-fetched by the
//! background refresher until nobody has asked for it for a full price TTL.
//! All upstream calls, foreground and background, share one token bucket.

use crate::error::{Result, ServiceError};
use crate::metrics::CacheMetrics;
use crate::models::PoolQuote;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use moka::future::Cache;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Solana system program id, priced as wrapped SOL
pub const SOLANA_SYSTEM_PROGRAM: &str = "11111111111111111111111111111111";
pub const SOLANA_WRAPPED_MINT: &str = "So11111111111111111111111111111111111111112";

/// Upstream price quotes; may return fewer pairs than addresses asked for
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_quotes(&self, addresses: &[String]) -> Result<Vec<PoolQuote>>;
}

#[derive(Debug, Clone)]
pub struct PriceCacheConfig {
    pub ttl: Duration,
    pub refresh_interval: Duration,
    pub batch_size: usize,
    pub rate_per_sec: u32,
    pub burst: u32,
    pub fetch_timeout: Duration,
    /// Address rewrites applied before lookup
    pub native_aliases: HashMap<String, String>,
}

impl Default for PriceCacheConfig {
    fn default() -> Self {
        let mut native_aliases = HashMap::new();
        native_aliases.insert(SOLANA_SYSTEM_PROGRAM.to_string(), SOLANA_WRAPPED_MINT.to_string());

        Self {
            ttl: Duration::from_secs(5 * 60),
            refresh_interval: Duration::from_secs(5),
            batch_size: 30,
            rate_per_sec: 5,
            burst: 1,
            fetch_timeout: Duration::from_secs(10),
            native_aliases,
        }
    }
}

/// Pick one USD price per base token
///
/// The quote with strictly greater USD liquidity wins; on equal liquidity
/// the quote seen first keeps its place. This holds both between pools of
/// the same pair and between different quote tokens for one base.
pub fn select_winning_prices(quotes: &[PoolQuote]) -> Vec<(String, Decimal)> {
    let mut order: Vec<&str> = Vec::new();
    let mut best: HashMap<&str, &PoolQuote> = HashMap::new();

    for quote in quotes {
        match best.get(quote.base_address.as_str()) {
            Some(current) if current.liquidity_usd >= quote.liquidity_usd => {}
            Some(_) => {
                best.insert(&quote.base_address, quote);
            }
            None => {
                order.push(&quote.base_address);
                best.insert(&quote.base_address, quote);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|base| best.get(base).map(|q| (base.to_string(), q.usd_price)))
        .collect()
}

pub struct PriceCache {
    source: Arc<dyn PriceSource>,
    limiter: DefaultDirectRateLimiter,
    interesting: Cache<String, ()>,
    prices: Cache<String, Decimal>,
    config: PriceCacheConfig,
    metrics: CacheMetrics,
}

impl PriceCache {
    pub fn new(source: Arc<dyn PriceSource>, config: PriceCacheConfig) -> Self {
        let rate = NonZeroU32::new(config.rate_per_sec).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(rate).allow_burst(burst));

        Self {
            source,
            limiter,
            interesting: Cache::builder().time_to_idle(config.ttl).build(),
            prices: Cache::builder().time_to_live(config.ttl).build(),
            config,
            metrics: CacheMetrics::new("price"),
        }
    }

    pub fn config(&self) -> &PriceCacheConfig {
        &self.config
    }

    fn canonical(&self, address: &str) -> String {
        self.config
            .native_aliases
            .get(address)
            .cloned()
            .unwrap_or_else(|| address.to_string())
    }

    /// Concurrent misses for one address share a single upstream call
    pub async fn get_price(&self, address: &str) -> Result<Decimal> {
        let key = self.canonical(address);
        self.interesting.insert(key.clone(), ()).await;

        if let Some(price) = self.prices.get(&key).await {
            self.metrics.record_hit();
            return Ok(price);
        }
        self.metrics.record_miss();

        self.prices
            .try_get_with(key.clone(), self.load_one(&key))
            .await
            .map_err(|_| ServiceError::PriceNotFound(address.to_string()))
    }

    /// Fetch one address; other bases in the response are stored directly
    async fn load_one(&self, key: &str) -> Result<Decimal> {
        let mut winners = self
            .fetch_winners(&[key.to_string()])
            .await
            .ok_or_else(|| ServiceError::PriceNotFound(key.to_string()))?;
        let price = winners
            .remove(key)
            .ok_or_else(|| ServiceError::PriceNotFound(key.to_string()))?;
        self.metrics.record_write();
        self.store_winners(winners).await;
        Ok(price)
    }

    /// Prices for every address that resolved, keyed as passed in
    pub async fn get_price_multi(&self, addresses: &[String]) -> HashMap<String, Decimal> {
        let mut resolved = HashMap::with_capacity(addresses.len());
        let mut missing: Vec<(&String, String)> = Vec::new();

        for address in addresses {
            let key = self.canonical(address);
            self.interesting.insert(key.clone(), ()).await;
            match self.prices.get(&key).await {
                Some(price) => {
                    self.metrics.record_hit();
                    resolved.insert(address.clone(), price);
                }
                None => {
                    self.metrics.record_miss();
                    missing.push((address, key));
                }
            }
        }

        if missing.is_empty() {
            return resolved;
        }

        let mut seen = HashSet::new();
        let keys: Vec<String> = missing
            .iter()
            .filter(|(_, key)| seen.insert(key.clone()))
            .map(|(_, key)| key.clone())
            .collect();
        for batch in keys.chunks(self.config.batch_size.max(1)) {
            self.fetch_missing(batch).await;
        }

        for (address, key) in missing {
            if let Some(price) = self.prices.get(&key).await {
                resolved.insert(address.clone(), price);
            }
        }
        resolved
    }

    /// Re-fetch every interesting address; returns how many prices were stored
    pub async fn refresh_all(&self) -> usize {
        let keys: Vec<String> = self.interesting.iter().map(|(k, _)| (*k).clone()).collect();
        let mut stored = 0;
        for batch in keys.chunks(self.config.batch_size.max(1)) {
            if let Some(winners) = self.fetch_winners(batch).await {
                stored += self.store_winners(winners).await;
            }
        }
        stored
    }

    /// Like `refresh_all` for one batch, minus anything another caller
    /// cached while this one waited for the limiter
    async fn fetch_missing(&self, batch: &[String]) {
        self.limiter.until_ready().await;

        let mut still_missing = Vec::with_capacity(batch.len());
        for key in batch {
            if !self.prices.contains_key(key) {
                still_missing.push(key.clone());
            }
        }
        if still_missing.is_empty() {
            return;
        }

        if let Some(winners) = self.query_source(&still_missing).await {
            self.store_winners(winners).await;
        }
    }

    async fn fetch_winners(&self, batch: &[String]) -> Option<HashMap<String, Decimal>> {
        self.limiter.until_ready().await;
        self.query_source(batch).await
    }

    /// `None` when the upstream call failed or timed out
    async fn query_source(&self, batch: &[String]) -> Option<HashMap<String, Decimal>> {
        let fetch = self.source.fetch_quotes(batch);
        let quotes = match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(Ok(quotes)) => quotes,
            Ok(Err(e)) => {
                self.metrics.record_error(e.kind());
                warn!(batch = batch.len(), error = %e, "Failed to fetch prices");
                return None;
            }
            Err(_) => {
                self.metrics.record_error("timeout");
                warn!(batch = batch.len(), "Price fetch timed out");
                return None;
            }
        };

        let winners: HashMap<String, Decimal> =
            select_winning_prices(&quotes).into_iter().collect();
        debug!(batch = batch.len(), priced = winners.len(), "Fetched prices");
        Some(winners)
    }

    async fn store_winners(&self, winners: HashMap<String, Decimal>) -> usize {
        let stored = winners.len();
        for (address, price) in winners {
            self.prices.insert(address, price).await;
            self.metrics.record_write();
        }
        stored
    }
}

/// Call `refresh_all` every refresh interval until shutdown is signalled
pub fn spawn_price_refresher(
    cache: Arc<PriceCache>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let interval = cache.config().refresh_interval;
    info!(interval_secs = interval.as_secs(), "Starting price refresher");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let stored = cache.refresh_all().await;
                    debug!(stored = stored, "Price refresh finished");
                }
            }
        }

        info!("Price refresher stopped");
    })
}
