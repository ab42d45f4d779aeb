//! Error types for bus operations

use thiserror::Error;

/// Message bus errors
#[derive(Error, Debug)]
pub enum BusError {
    /// Redis connection or operation error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Payload serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Message received on an unexpected topic or with an unusable payload
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Topic or pattern rejected before reaching the transport
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
}
