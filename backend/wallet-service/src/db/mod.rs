//! Authoritative storage
//!
//! The caches only see these traits; `PgTokenStore` and `PgProfileStore`
//! are the PostgreSQL implementations.

use crate::error::{Result, ServiceError};
use crate::models::{Chain, LogoStatus, TokenKey, TokenRecord, UserProfileSummary};
use async_trait::async_trait;

mod profiles;
mod tokens;

pub use profiles::PgProfileStore;
pub use tokens::PgTokenStore;

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_token(&self, key: &TokenKey) -> Result<Option<TokenRecord>>;

    /// Insert a new token; a unique-key conflict is reported as
    /// [`ServiceError::DuplicateWriteConflict`].
    async fn insert_token(&self, token: &TokenRecord) -> Result<()>;

    async fn tokens_with_logo_status(&self, status: LogoStatus) -> Result<Vec<TokenRecord>>;

    async fn update_logo_status(&self, key: &TokenKey, status: LogoStatus) -> Result<()>;

    /// Replace the logo URI and status together
    async fn update_logo(&self, key: &TokenKey, logo_uri: &str, status: LogoStatus) -> Result<()>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn profile_by_id(&self, id: i64) -> Result<Option<UserProfileSummary>>;

    async fn profile_by_username(&self, username: &str) -> Result<Option<UserProfileSummary>>;

    async fn profile_by_address(
        &self,
        address: &str,
        chain: Chain,
    ) -> Result<Option<UserProfileSummary>>;
}

/// Map a unique-constraint violation to `DuplicateWriteConflict`
pub(crate) fn map_unique_violation(err: sqlx::Error) -> ServiceError {
    match err {
        sqlx::Error::Database(e) if e.is_unique_violation() => ServiceError::DuplicateWriteConflict,
        other => ServiceError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_unique_errors_pass_through() {
        let err = map_unique_violation(sqlx::Error::RowNotFound);
        assert!(matches!(err, ServiceError::Database(sqlx::Error::RowNotFound)));
    }
}
