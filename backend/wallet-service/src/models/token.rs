use super::Chain;
use crate::error::{Result, ServiceError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logo normalization state. `Handled` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LogoStatus {
    #[default]
    New,
    Handled,
    Failed,
}

impl LogoStatus {
    pub fn code(self) -> i16 {
        match self {
            LogoStatus::New => 0,
            LogoStatus::Handled => 1,
            LogoStatus::Failed => 2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(LogoStatus::New),
            1 => Some(LogoStatus::Handled),
            2 => Some(LogoStatus::Failed),
            _ => None,
        }
    }
}

/// Chain-specific extras stored alongside a token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sui_object_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub chain: Chain,
    pub address: String,
}

impl TokenKey {
    pub fn new(address: impl Into<String>, chain: Chain) -> Self {
        Self {
            chain,
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: i32,
    pub logo_uri: String,
    pub chain: Chain,
    #[serde(skip)]
    pub logo_status: LogoStatus,
    #[serde(default)]
    pub meta: TokenMeta,
    #[serde(skip, default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(
        address: impl Into<String>,
        chain: Chain,
        symbol: impl Into<String>,
        name: impl Into<String>,
        decimals: i32,
        logo_uri: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            symbol: symbol.into(),
            name: name.into(),
            decimals,
            logo_uri: logo_uri.into(),
            chain,
            logo_status: LogoStatus::New,
            meta: TokenMeta::default(),
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> TokenKey {
        TokenKey::new(self.address.clone(), self.chain)
    }

    /// Reject records that must never reach the store
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(ServiceError::Validation("token address is empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(ServiceError::Validation("token name is empty".into()));
        }
        if self.symbol.trim().is_empty() {
            return Err(ServiceError::Validation("token symbol is empty".into()));
        }
        if self.decimals < 0 {
            return Err(ServiceError::Validation(format!(
                "token decimals must be non-negative, got {}",
                self.decimals
            )));
        }
        Ok(())
    }
}
