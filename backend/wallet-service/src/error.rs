use crate::models::Chain;
use message_bus::BusError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Price not found: {0}")]
    PriceNotFound(String),

    #[error("Chain not supported: {0}")]
    ChainNotSupported(Chain),

    /// Upstream call failed or timed out; safe to retry later
    #[error("Transient fetch error: {0}")]
    TransientFetch(String),

    /// Unique-key conflict on insert; `create` treats it as success
    #[error("Duplicate write conflict")]
    DuplicateWriteConflict,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::TransientFetch(err.to_string())
    }
}

impl ServiceError {
    /// Short label used for the `error_type` metric dimension
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::PriceNotFound(_) => "price_not_found",
            ServiceError::ChainNotSupported(_) => "chain_not_supported",
            ServiceError::TransientFetch(_) => "transient_fetch",
            ServiceError::DuplicateWriteConflict => "duplicate",
            ServiceError::Validation(_) => "validation",
            ServiceError::Database(_) => "database",
            ServiceError::Bus(_) => "bus",
            ServiceError::Upload(_) => "upload",
            ServiceError::Serialization(_) => "serialization",
        }
    }
}
