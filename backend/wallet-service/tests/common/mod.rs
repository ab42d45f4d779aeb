//! In-memory collaborators for integration tests
//!
//! Each fake counts the calls that matter so tests can assert how often the
//! slow path was taken.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use wallet_service::db::{ProfileStore, TokenStore};
use wallet_service::models::{
    Chain, LogoStatus, PoolQuote, TokenKey, TokenRecord, UserProfileSummary,
};
use wallet_service::services::{BlobUploader, PriceSource, TokenFetcher};
use wallet_service::{Result, ServiceError};

/// Poll `check` until it holds or `timeout` elapses
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn token(address: &str, chain: Chain, symbol: &str) -> TokenRecord {
    TokenRecord::new(address, chain, symbol, format!("{} Token", symbol), 6, "")
}

// ---------------------------------------------------------------------------
// Token store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryTokenStore {
    rows: Mutex<HashMap<TokenKey, TokenRecord>>,
    inserts: AtomicUsize,
    lookups: AtomicUsize,
    reject_logo_writes: AtomicBool,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: Vec<TokenRecord>) -> Self {
        let store = Self::default();
        {
            let mut rows = store.rows.lock();
            for token in tokens {
                rows.insert(token.key(), token);
            }
        }
        store
    }

    /// Committed rows
    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn row(&self, key: &TokenKey) -> Option<TokenRecord> {
        self.rows.lock().get(key).cloned()
    }

    /// `update_logo` fails from now on; status-only updates still succeed
    pub fn reject_logo_writes(&self) {
        self.reject_logo_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get_token(&self, key: &TokenKey) -> Result<Option<TokenRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self.rows.lock().get(key).cloned())
    }

    async fn insert_token(&self, token: &TokenRecord) -> Result<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let mut rows = self.rows.lock();
        if rows.contains_key(&token.key()) {
            return Err(ServiceError::DuplicateWriteConflict);
        }
        rows.insert(token.key(), token.clone());
        Ok(())
    }

    async fn tokens_with_logo_status(&self, status: LogoStatus) -> Result<Vec<TokenRecord>> {
        let mut tokens: Vec<TokenRecord> = self
            .rows
            .lock()
            .values()
            .filter(|t| t.logo_status == status)
            .cloned()
            .collect();
        tokens.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(tokens)
    }

    async fn update_logo_status(&self, key: &TokenKey, status: LogoStatus) -> Result<()> {
        if let Some(row) = self.rows.lock().get_mut(key) {
            row.logo_status = status;
        }
        Ok(())
    }

    async fn update_logo(&self, key: &TokenKey, logo_uri: &str, status: LogoStatus) -> Result<()> {
        if self.reject_logo_writes.load(Ordering::SeqCst) {
            return Err(ServiceError::Database(sqlx::Error::PoolTimedOut));
        }
        if let Some(row) = self.rows.lock().get_mut(key) {
            row.logo_uri = logo_uri.to_string();
            row.logo_status = status;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Token fetcher
// ---------------------------------------------------------------------------

/// Knows a fixed set of tokens and answers after `delay`
pub struct CountingFetcher {
    known: HashMap<String, TokenRecord>,
    delay: Duration,
    calls: AtomicUsize,
}

impl CountingFetcher {
    pub fn new(known: Vec<TokenRecord>) -> Self {
        Self {
            known: known.into_iter().map(|t| (t.address.clone(), t)).collect(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenFetcher for CountingFetcher {
    async fn fetch_token(&self, address: &str) -> Result<TokenRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.known
            .get(address)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(address.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Profile store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryProfileStore {
    users: Mutex<Vec<(UserProfileSummary, Vec<(String, Chain)>)>>,
    lookups: AtomicUsize,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, profile: UserProfileSummary, accounts: Vec<(&str, Chain)>) {
        let accounts = accounts.into_iter().map(|(a, c)| (a.to_string(), c)).collect();
        self.users.lock().push((profile, accounts));
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn find(
        &self,
        pred: impl Fn(&(UserProfileSummary, Vec<(String, Chain)>)) -> bool,
    ) -> Option<UserProfileSummary> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.users.lock().iter().find(|u| pred(u)).map(|(p, _)| p.clone())
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn profile_by_id(&self, id: i64) -> Result<Option<UserProfileSummary>> {
        Ok(self.find(|(p, _)| p.id == id))
    }

    async fn profile_by_username(&self, username: &str) -> Result<Option<UserProfileSummary>> {
        Ok(self.find(|(p, _)| p.username == username))
    }

    async fn profile_by_address(
        &self,
        address: &str,
        chain: Chain,
    ) -> Result<Option<UserProfileSummary>> {
        Ok(self.find(|(_, accounts)| {
            accounts.iter().any(|(a, c)| a == address && *c == chain)
        }))
    }
}

pub fn profile(id: i64, username: &str, display_name: &str) -> UserProfileSummary {
    UserProfileSummary {
        id,
        username: username.to_string(),
        display_name: display_name.to_string(),
        thumbnail: Default::default(),
    }
}

// ---------------------------------------------------------------------------
// Uploader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
}

pub struct RecordingUploader {
    base_url: String,
    uploads: Mutex<Vec<Upload>>,
    fail: bool,
}

impl RecordingUploader {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            uploads: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing(base_url: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(base_url)
        }
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl BlobUploader for RecordingUploader {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str, content_type: &str) -> Result<String> {
        if self.fail {
            return Err(ServiceError::Upload("bucket unavailable".into()));
        }
        self.uploads.lock().push(Upload {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            size: bytes.len(),
        });
        Ok(format!("{}/{}", self.base_url, file_name))
    }
}

// ---------------------------------------------------------------------------
// Price source
// ---------------------------------------------------------------------------

/// Serves scripted quotes per base address and records every batch
#[derive(Default)]
pub struct ScriptedPriceSource {
    quotes: Mutex<HashMap<String, Vec<PoolQuote>>>,
    batches: Mutex<Vec<Vec<String>>>,
    latency: Duration,
}

impl ScriptedPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_quotes(&self, base: &str, quotes: Vec<PoolQuote>) {
        self.quotes.lock().insert(base.to_string(), quotes);
    }

    pub fn set_price(&self, base: &str, price: Decimal) {
        self.set_quotes(base, vec![PoolQuote::new(base, "USDC", price, Decimal::from(1_000))]);
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().len()
    }
}

#[async_trait]
impl PriceSource for ScriptedPriceSource {
    async fn fetch_quotes(&self, addresses: &[String]) -> Result<Vec<PoolQuote>> {
        self.batches.lock().push(addresses.to_vec());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let quotes = self.quotes.lock();
        Ok(addresses
            .iter()
            .filter_map(|a| quotes.get(a))
            .flatten()
            .cloned()
            .collect())
    }
}
