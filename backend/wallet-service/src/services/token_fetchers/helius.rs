use super::{JsonRpcRequest, JsonRpcResponse, TokenFetcher};
use crate::error::{Result, ServiceError};
use crate::models::{Chain, TokenRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const HELIUS_RPC_URL: &str = "https://mainnet.helius-rpc.com/";

/// Solana token metadata via the Helius DAS `getAsset` method
pub struct HeliusFetcher {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct GetAssetParams<'a> {
    id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Asset {
    content: AssetContent,
    token_info: TokenInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AssetContent {
    metadata: AssetMetadata,
    links: AssetLinks,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AssetMetadata {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AssetLinks {
    image: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenInfo {
    symbol: String,
    decimals: i32,
}

impl HeliusFetcher {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::with_endpoint(HELIUS_RPC_URL, api_key, timeout)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

fn asset_to_token(address: &str, asset: Asset) -> Result<TokenRecord> {
    // DAS returns assets for NFTs too; only fungible tokens carry a symbol
    if asset.token_info.symbol.is_empty() {
        return Err(ServiceError::NotFound(format!("solana token {}", address)));
    }

    Ok(TokenRecord::new(
        address,
        Chain::Solana,
        asset.token_info.symbol,
        asset.content.metadata.name,
        asset.token_info.decimals,
        asset.content.links.image,
    ))
}

#[async_trait]
impl TokenFetcher for HeliusFetcher {
    async fn fetch_token(&self, address: &str) -> Result<TokenRecord> {
        debug!(address = %address, "Fetching token from Helius");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("api-key", self.api_key.as_str())])
            .json(&JsonRpcRequest::new("getAsset", GetAssetParams { id: address }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::TransientFetch(format!(
                "helius returned {}",
                response.status()
            )));
        }

        let body: JsonRpcResponse<Asset> = response.json().await?;
        if let Some(err) = body.error {
            return Err(ServiceError::TransientFetch(format!(
                "helius rpc error {}: {}",
                err.code, err.message
            )));
        }

        asset_to_token(address, body.result.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_parsing() {
        let raw = r#"{
            "jsonrpc": "2.0",
            "id": "abc",
            "result": {
                "interface": "FungibleToken",
                "content": {
                    "metadata": { "name": "Jupiter", "symbol": "JUP" },
                    "links": { "image": "https://static.jup.ag/jup/icon.png" }
                },
                "token_info": { "symbol": "JUP", "decimals": 6, "token_program": "Tokenkeg" }
            }
        }"#;
        let body: JsonRpcResponse<Asset> = serde_json::from_str(raw).unwrap();
        let token = asset_to_token("JUPyi", body.result.unwrap()).unwrap();

        assert_eq!(token.symbol, "JUP");
        assert_eq!(token.name, "Jupiter");
        assert_eq!(token.decimals, 6);
        assert_eq!(token.logo_uri, "https://static.jup.ag/jup/icon.png");
        assert_eq!(token.chain, Chain::Solana);
    }

    #[test]
    fn test_asset_without_symbol_is_not_found() {
        let raw = r#"{"result": {"content": {"metadata": {"name": "Some NFT"}}}}"#;
        let body: JsonRpcResponse<Asset> = serde_json::from_str(raw).unwrap();
        let err = asset_to_token("nft", body.result.unwrap()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
