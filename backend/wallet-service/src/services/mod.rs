/// Cache components and their upstream adapters
pub mod dexscreener;
pub mod logo_pipeline;
pub mod price_cache;
pub mod profile_cache;
pub mod replay_guard;
pub mod token_fetchers;
pub mod token_resolver;
pub mod uploader;

pub use dexscreener::DexScreenerSource;
pub use logo_pipeline::{spawn_logo_worker, LogoPipeline, LogoPipelineConfig};
pub use price_cache::{spawn_price_refresher, PriceCache, PriceCacheConfig, PriceSource};
pub use profile_cache::{ProfileCacheConfig, ProfileUpdates, UserProfileCache};
pub use replay_guard::{ReplayGuard, ReplayGuardConfig};
pub use token_fetchers::{HeliusFetcher, SuiFetcher, TokenFetcher};
pub use token_resolver::{TokenResolver, TokenResolverConfig};
pub use uploader::{BlobUploader, S3BlobUploader};
