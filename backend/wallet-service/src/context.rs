//! Application context
//!
//! Built once at startup and passed explicitly; owns every component, bus
//! subscription and background task so shutdown is deterministic.

use crate::db::{ProfileStore, TokenStore};
use crate::error::Result;
use crate::models::Chain;
use crate::services::logo_pipeline::{spawn_logo_worker, LogoPipeline, LogoPipelineConfig};
use crate::services::price_cache::{
    spawn_price_refresher, PriceCache, PriceCacheConfig, PriceSource,
};
use crate::services::profile_cache::{ProfileCacheConfig, ProfileUpdates, UserProfileCache};
use crate::services::replay_guard::{ReplayGuard, ReplayGuardConfig};
use crate::services::token_fetchers::TokenFetcher;
use crate::services::token_resolver::{TokenResolver, TokenResolverConfig};
use crate::services::uploader::BlobUploader;
use message_bus::{MessageBus, Subscription};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// External dependencies the components are built on
pub struct Collaborators {
    pub token_store: Arc<dyn TokenStore>,
    pub profile_store: Arc<dyn ProfileStore>,
    pub token_fetchers: HashMap<Chain, Arc<dyn TokenFetcher>>,
    pub price_source: Arc<dyn PriceSource>,
    pub uploader: Arc<dyn BlobUploader>,
    pub bus: Arc<dyn MessageBus>,
}

#[derive(Debug, Clone, Default)]
pub struct ComponentConfig {
    pub tokens: TokenResolverConfig,
    pub logos: LogoPipelineConfig,
    pub prices: PriceCacheConfig,
    pub profiles: ProfileCacheConfig,
    pub signatures: ReplayGuardConfig,
}

pub struct AppContext {
    pub tokens: Arc<TokenResolver>,
    pub prices: Arc<PriceCache>,
    pub profiles: Arc<UserProfileCache>,
    pub profile_updates: ProfileUpdates,
    pub replay_guard: Arc<ReplayGuard>,
    subscriptions: Vec<Subscription>,
    workers: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl AppContext {
    /// Build every component, subscribe to the bus and start workers
    pub async fn start(collaborators: Collaborators, config: ComponentConfig) -> Result<Self> {
        let Collaborators {
            token_store,
            profile_store,
            token_fetchers,
            price_source,
            uploader,
            bus,
        } = collaborators;

        let tokens = Arc::new(TokenResolver::new(
            token_store.clone(),
            token_fetchers,
            config.tokens,
        ));
        let logos = Arc::new(LogoPipeline::new(
            token_store,
            uploader,
            tokens.clone(),
            config.logos,
        )?);
        let prices = Arc::new(PriceCache::new(price_source, config.prices));
        let profiles = Arc::new(UserProfileCache::new(profile_store, config.profiles));
        let replay_guard = Arc::new(ReplayGuard::new(bus.clone(), config.signatures));

        let subscriptions = vec![
            profiles.start_listening(bus.as_ref()).await?,
            replay_guard.start().await?,
        ];

        let (shutdown, shutdown_rx) = watch::channel(false);
        let workers = vec![
            spawn_logo_worker(logos, shutdown_rx.clone()),
            spawn_price_refresher(prices.clone(), shutdown_rx),
        ];

        info!("Application context started");

        Ok(Self {
            tokens,
            prices,
            profiles,
            profile_updates: ProfileUpdates::new(bus),
            replay_guard,
            subscriptions,
            workers,
            shutdown,
        })
    }

    /// Stop workers and subscriptions, waiting for each to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);

        for subscription in self.subscriptions {
            subscription.unsubscribe().await;
        }
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = ?e, "Background worker panicked");
            }
        }

        info!("Application context stopped");
    }
}
