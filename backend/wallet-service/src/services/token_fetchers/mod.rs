//! Per-chain token metadata sources

use crate::error::Result;
use crate::models::TokenRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod helius;
mod sui;

pub use helius::HeliusFetcher;
pub use sui::SuiFetcher;

/// Fetches token metadata for one chain from its upstream API
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    /// Returns `NotFound` when the upstream does not know the address
    async fn fetch_token(&self, address: &str) -> Result<TokenRecord>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: String,
    method: &'a str,
    params: P,
}

impl<'a, P: Serialize> JsonRpcRequest<'a, P> {
    fn new(method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            id: uuid::Uuid::new_v4().simple().to_string(),
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}
