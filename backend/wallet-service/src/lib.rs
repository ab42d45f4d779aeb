/// Wallet Service Library
///
/// Read-through caches for a multi-chain wallet backend, kept loosely
/// coherent across instances through a publish/subscribe bus.
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `context`: Application context owning every component and task
/// - `db`: Token and profile stores
/// - `error`: Error types
/// - `metrics`: Prometheus cache counters
/// - `models`: Data models
/// - `services`: Token resolver, price cache, profile cache, replay guard
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use context::{AppContext, Collaborators, ComponentConfig};
pub use error::{Result, ServiceError};
