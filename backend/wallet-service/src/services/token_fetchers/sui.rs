use super::{JsonRpcRequest, JsonRpcResponse, TokenFetcher};
use crate::error::{Result, ServiceError};
use crate::models::{Chain, TokenMeta, TokenRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Sui coin metadata via `suix_getCoinMetadata`
pub struct SuiFetcher {
    client: Client,
    rpc_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinMetadata {
    decimals: i32,
    name: String,
    symbol: String,
    #[serde(default)]
    icon_url: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

impl SuiFetcher {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
        })
    }
}

fn metadata_to_token(coin_type: &str, metadata: CoinMetadata) -> TokenRecord {
    let mut token = TokenRecord::new(
        coin_type,
        Chain::Sui,
        metadata.symbol,
        metadata.name,
        metadata.decimals,
        metadata.icon_url.unwrap_or_default(),
    );
    token.meta = TokenMeta {
        sui_object_id: metadata.id,
    };
    token
}

#[async_trait]
impl TokenFetcher for SuiFetcher {
    async fn fetch_token(&self, address: &str) -> Result<TokenRecord> {
        debug!(coin_type = %address, "Fetching coin metadata from Sui");

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&JsonRpcRequest::new("suix_getCoinMetadata", [address]))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::TransientFetch(format!(
                "sui rpc returned {}",
                response.status()
            )));
        }

        let body: JsonRpcResponse<CoinMetadata> = response.json().await?;
        if let Some(err) = body.error {
            return Err(ServiceError::TransientFetch(format!(
                "sui rpc error {}: {}",
                err.code, err.message
            )));
        }

        // Unknown coin types come back as `"result": null`
        body.result
            .map(|metadata| metadata_to_token(address, metadata))
            .ok_or_else(|| ServiceError::NotFound(format!("sui coin {}", address)))
    }
}
