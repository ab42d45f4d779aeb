/// Wallet Service Main Entry Point
///
/// Wires together:
/// - PostgreSQL token and profile stores
/// - Redis message bus
/// - Helius / Sui token fetchers and DexScreener prices
/// - S3-compatible logo storage
///
/// then runs the background workers until Ctrl+C or SIGTERM.
use anyhow::{Context, Result};
use message_bus::{MessageBus, RedisBus};
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use wallet_service::config::Settings;
use wallet_service::db::{PgProfileStore, PgTokenStore};
use wallet_service::models::Chain;
use wallet_service::services::{
    DexScreenerSource, HeliusFetcher, S3BlobUploader, SuiFetcher, TokenFetcher,
};
use wallet_service::{AppContext, Collaborators};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "wallet_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Wallet Service");

    let settings = Settings::load().context("Failed to load configuration")?;
    info!(server_id = %settings.server_id, "Configuration loaded successfully");

    let db_pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .connect(&settings.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    info!(
        "Database pool initialized with {} max connections",
        settings.database.max_connections
    );

    let bus: Arc<dyn MessageBus> = Arc::new(
        RedisBus::connect(&settings.redis.url)
            .await
            .context("Failed to connect to Redis")?,
    );

    let fetch_timeout = Duration::from_secs(settings.cache.fetch_timeout_secs);
    let mut token_fetchers: HashMap<Chain, Arc<dyn TokenFetcher>> = HashMap::new();
    match &settings.chains.helius_api_key {
        Some(api_key) => {
            let helius = HeliusFetcher::new(api_key.clone(), fetch_timeout)
                .context("Failed to build Helius client")?;
            token_fetchers.insert(Chain::Solana, Arc::new(helius));
        }
        None => warn!("SOLANA_HELIUS_API_KEY not set; Solana tokens resolve from store only"),
    }
    let sui = SuiFetcher::new(settings.chains.sui_rpc_url.clone(), fetch_timeout)
        .context("Failed to build Sui RPC client")?;
    token_fetchers.insert(Chain::Sui, Arc::new(sui));

    let price_source =
        DexScreenerSource::new(fetch_timeout).context("Failed to build DexScreener client")?;
    let uploader = S3BlobUploader::from_settings(&settings.storage).await;

    let collaborators = Collaborators {
        token_store: Arc::new(PgTokenStore::new(db_pool.clone())),
        profile_store: Arc::new(PgProfileStore::new(db_pool.clone())),
        token_fetchers,
        price_source: Arc::new(price_source),
        uploader: Arc::new(uploader),
        bus,
    };

    let context = AppContext::start(
        collaborators,
        settings.cache.component_config(&settings.storage.public_url),
    )
    .await
    .context("Failed to start application context")?;

    shutdown_signal().await;

    context.shutdown().await;
    db_pool.close().await;

    info!("Wallet service shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
