//! Configuration management for Wallet Service
//!
//! Loads settings from environment variables, with a `.env` file honoured in
//! debug builds. Every cache tunable has a default, so only connection
//! strings are mandatory.
//!
//! # Example
//!
//! ```no_run
//! use wallet_service::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     println!("server id: {}", settings.server_id);
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::context::ComponentConfig;
use crate::services::logo_pipeline::LogoPipelineConfig;
use crate::services::price_cache::PriceCacheConfig;
use crate::services::profile_cache::ProfileCacheConfig;
use crate::services::replay_guard::ReplayGuardConfig;
use crate::services::token_resolver::TokenResolverConfig;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Identifies this instance in logs
    pub server_id: String,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub chains: ChainSettings,
    pub storage: StorageSettings,
    pub cache: CacheSettings,
}

impl Settings {
    pub fn load() -> Result<Self> {
        // Load .env file in development
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            server_id: env::var("SERVER_ID")
                .unwrap_or_else(|_| format!("wallet-{}", uuid::Uuid::new_v4().simple())),
            database: DatabaseSettings::from_env()?,
            redis: RedisSettings::from_env()?,
            chains: ChainSettings::from_env(),
            storage: StorageSettings::from_env()?,
            cache: CacheSettings::from_env()?,
        })
    }
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 20)?,
            acquire_timeout: parse_var("DATABASE_ACQUIRE_TIMEOUT", 5)?,
        })
    }
}

/// Redis settings (message bus transport)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub url: String,
}

impl RedisSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("REDIS_URL").context("REDIS_URL must be set")?,
        })
    }
}

/// Chain RPC endpoints
///
/// A chain without credentials has no fetcher; lookups for it resolve only
/// from memory and the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettings {
    pub helius_api_key: Option<String>,
    pub sui_rpc_url: String,
}

impl ChainSettings {
    fn from_env() -> Self {
        Self {
            helius_api_key: env::var("SOLANA_HELIUS_API_KEY").ok().filter(|k| !k.is_empty()),
            sui_rpc_url: env::var("SUI_RPC_URL")
                .unwrap_or_else(|_| "https://fullnode.mainnet.sui.io:443".to_string()),
        }
    }
}

/// S3-compatible object storage for normalized logos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key_id: Option<String>,
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
    /// Public base URL uploaded files are served from
    pub public_url: String,
}

impl StorageSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            endpoint: env::var("STORAGE_ENDPOINT").ok(),
            region: env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
            bucket: env::var("STORAGE_BUCKET").context("STORAGE_BUCKET must be set")?,
            access_key_id: env::var("STORAGE_ACCESS_KEY_ID").ok(),
            secret_access_key: env::var("STORAGE_SECRET_ACCESS_KEY").ok(),
            public_url: env::var("STORAGE_PUBLIC_URL")
                .context("STORAGE_PUBLIC_URL must be set")?
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Cache sizes, TTLs and worker cadences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub token_ttl_secs: u64,
    pub price_ttl_secs: u64,
    pub price_refresh_interval_secs: u64,
    pub price_batch_size: usize,
    pub price_rate_per_sec: u32,
    pub profile_capacity: usize,
    pub negative_ttl_secs: u64,
    pub signature_ttl_secs: u64,
    pub logo_sweep_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub logo_fetch_timeout_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            token_ttl_secs: 60 * 60,
            price_ttl_secs: 5 * 60,
            price_refresh_interval_secs: 5,
            price_batch_size: 30,
            price_rate_per_sec: 5,
            profile_capacity: 1_000_000,
            negative_ttl_secs: 15 * 60,
            signature_ttl_secs: 15,
            logo_sweep_interval_secs: 60,
            fetch_timeout_secs: 10,
            logo_fetch_timeout_secs: 15,
        }
    }
}

impl CacheSettings {
    fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            token_ttl_secs: parse_var("TOKEN_CACHE_TTL_SECS", d.token_ttl_secs)?,
            price_ttl_secs: parse_var("PRICE_CACHE_TTL_SECS", d.price_ttl_secs)?,
            price_refresh_interval_secs: parse_var(
                "PRICE_REFRESH_INTERVAL_SECS",
                d.price_refresh_interval_secs,
            )?,
            price_batch_size: parse_var("PRICE_BATCH_SIZE", d.price_batch_size)?,
            price_rate_per_sec: parse_var("PRICE_RATE_PER_SEC", d.price_rate_per_sec)?,
            profile_capacity: parse_var("PROFILE_CACHE_CAPACITY", d.profile_capacity)?,
            negative_ttl_secs: parse_var("NEGATIVE_CACHE_TTL_SECS", d.negative_ttl_secs)?,
            signature_ttl_secs: parse_var("SIGNATURE_TTL_SECS", d.signature_ttl_secs)?,
            logo_sweep_interval_secs: parse_var(
                "LOGO_SWEEP_INTERVAL_SECS",
                d.logo_sweep_interval_secs,
            )?,
            fetch_timeout_secs: parse_var("FETCH_TIMEOUT_SECS", d.fetch_timeout_secs)?,
            logo_fetch_timeout_secs: parse_var(
                "LOGO_FETCH_TIMEOUT_SECS",
                d.logo_fetch_timeout_secs,
            )?,
        })
    }

    /// Translate settings into per-component configs
    pub fn component_config(&self, public_url: &str) -> ComponentConfig {
        let fetch_timeout = Duration::from_secs(self.fetch_timeout_secs);
        ComponentConfig {
            tokens: TokenResolverConfig {
                memory_ttl: Duration::from_secs(self.token_ttl_secs),
                fetch_timeout,
            },
            logos: LogoPipelineConfig {
                sweep_interval: Duration::from_secs(self.logo_sweep_interval_secs),
                fetch_timeout: Duration::from_secs(self.logo_fetch_timeout_secs),
                hosted_prefix: public_url.to_string(),
            },
            prices: PriceCacheConfig {
                ttl: Duration::from_secs(self.price_ttl_secs),
                refresh_interval: Duration::from_secs(self.price_refresh_interval_secs),
                batch_size: self.price_batch_size,
                rate_per_sec: self.price_rate_per_sec,
                fetch_timeout,
                ..PriceCacheConfig::default()
            },
            profiles: ProfileCacheConfig {
                capacity: self.profile_capacity,
                negative_ttl: Duration::from_secs(self.negative_ttl_secs),
            },
            signatures: ReplayGuardConfig {
                ttl: Duration::from_secs(self.signature_ttl_secs),
            },
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_defaults() {
        let settings = CacheSettings::default();
        assert_eq!(settings.token_ttl_secs, 3600);
        assert_eq!(settings.price_batch_size, 30);
        assert_eq!(settings.profile_capacity, 1_000_000);
        assert_eq!(settings.signature_ttl_secs, 15);
    }

    #[test]
    fn test_component_config_carries_public_url() {
        let config = CacheSettings::default().component_config("https://images.example.com");
        assert_eq!(config.logos.hosted_prefix, "https://images.example.com");
        assert_eq!(config.prices.batch_size, 30);
        assert_eq!(config.tokens.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.profiles.negative_ttl, Duration::from_secs(900));
    }

    #[test]
    fn test_parse_var_default_and_invalid() {
        assert_eq!(parse_var("WALLET_TEST_UNSET_VAR", 7u64).unwrap(), 7);

        env::set_var("WALLET_TEST_BAD_VAR", "not-a-number");
        assert!(parse_var("WALLET_TEST_BAD_VAR", 1u64).is_err());
        env::remove_var("WALLET_TEST_BAD_VAR");
    }
}
