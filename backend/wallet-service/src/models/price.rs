use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One pool's view of a token price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolQuote {
    pub base_address: String,
    pub quote_address: String,
    pub usd_price: Decimal,
    pub liquidity_usd: Decimal,
}

impl PoolQuote {
    pub fn new(
        base_address: impl Into<String>,
        quote_address: impl Into<String>,
        usd_price: Decimal,
        liquidity_usd: Decimal,
    ) -> Self {
        Self {
            base_address: base_address.into(),
            quote_address: quote_address.into(),
            usd_price,
            liquidity_usd,
        }
    }
}
