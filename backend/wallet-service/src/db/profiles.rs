/// Read-only user profile projections
use super::ProfileStore;
use crate::error::Result;
use crate::models::{Chain, Thumbnail, UserProfileSummary};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: i64,
    username: String,
    name: Option<String>,
    thumbnail: Option<Json<Thumbnail>>,
}

impl From<ProfileRow> for UserProfileSummary {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            display_name: row.name.unwrap_or_default(),
            thumbnail: row.thumbnail.map(|t| t.0).unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn profile_by_id(&self, id: i64) -> Result<Option<UserProfileSummary>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, username, name, thumbnail FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn profile_by_username(&self, username: &str) -> Result<Option<UserProfileSummary>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, username, name, thumbnail FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn profile_by_address(
        &self,
        address: &str,
        chain: Chain,
    ) -> Result<Option<UserProfileSummary>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT u.id, u.username, u.name, u.thumbnail
            FROM users AS u
            JOIN accounts AS a ON u.id = a.user_id
            WHERE a.address = $1 AND a.chain = $2
            "#,
        )
        .bind(address)
        .bind(chain.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}
