/// DexScreener pair quotes
use crate::error::{Result, ServiceError};
use crate::models::PoolQuote;
use crate::services::price_cache::PriceSource;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEXSCREENER_TOKENS_URL: &str = "https://api.dexscreener.com/latest/dex/tokens";

#[derive(Debug, Deserialize)]
struct TokensResponse {
    #[serde(default)]
    pairs: Option<Vec<Pair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pair {
    base_token: PairToken,
    quote_token: PairToken,
    #[serde(default)]
    price_usd: Option<Decimal>,
    #[serde(default)]
    liquidity: Option<Liquidity>,
}

#[derive(Debug, Deserialize)]
struct PairToken {
    address: String,
}

#[derive(Debug, Deserialize)]
struct Liquidity {
    #[serde(default)]
    usd: Option<Decimal>,
}

/// Pairs without a USD price are dropped; missing liquidity counts as zero
fn to_quotes(response: TokensResponse) -> Vec<PoolQuote> {
    response
        .pairs
        .unwrap_or_default()
        .into_iter()
        .filter_map(|pair| {
            let usd_price = pair.price_usd?;
            let liquidity_usd = pair.liquidity.and_then(|l| l.usd).unwrap_or(Decimal::ZERO);
            Some(PoolQuote::new(
                pair.base_token.address,
                pair.quote_token.address,
                usd_price,
                liquidity_usd,
            ))
        })
        .collect()
}

pub struct DexScreenerSource {
    client: Client,
    base_url: String,
}

impl DexScreenerSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(DEXSCREENER_TOKENS_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceSource for DexScreenerSource {
    async fn fetch_quotes(&self, addresses: &[String]) -> Result<Vec<PoolQuote>> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/{}", self.base_url, addresses.join(","));
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::TransientFetch(format!(
                "dexscreener returned {}",
                response.status()
            )));
        }

        let body: TokensResponse = response.json().await?;
        let quotes = to_quotes(body);
        debug!(requested = addresses.len(), pairs = quotes.len(), "Fetched DexScreener quotes");
        Ok(quotes)
    }
}
