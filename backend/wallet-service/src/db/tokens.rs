/// Token metadata persistence
use super::{map_unique_violation, TokenStore};
use crate::error::{Result, ServiceError};
use crate::models::{Chain, LogoStatus, TokenKey, TokenMeta, TokenRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    address: String,
    symbol: String,
    name: String,
    decimals: i32,
    logo: String,
    chain: String,
    status: i16,
    meta: Option<Json<TokenMeta>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for TokenRecord {
    type Error = ServiceError;

    fn try_from(row: TokenRow) -> Result<Self> {
        let chain = row.chain.parse::<Chain>().map_err(ServiceError::Validation)?;
        let logo_status = LogoStatus::from_code(row.status).ok_or_else(|| {
            ServiceError::Validation(format!("unknown logo status {}", row.status))
        })?;

        Ok(TokenRecord {
            address: row.address,
            symbol: row.symbol,
            name: row.name,
            decimals: row.decimals,
            logo_uri: row.logo,
            chain,
            logo_status,
            meta: row.meta.map(|m| m.0).unwrap_or_default(),
            created_at: row.created_at,
        })
    }
}

const TOKEN_COLUMNS: &str =
    "address, symbol, name, decimals, logo, chain, status, meta, created_at";

#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn get_token(&self, key: &TokenKey) -> Result<Option<TokenRecord>> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {} FROM tokens WHERE address = $1 AND chain = $2",
            TOKEN_COLUMNS
        ))
        .bind(&key.address)
        .bind(key.chain.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TokenRecord::try_from).transpose()
    }

    async fn insert_token(&self, token: &TokenRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tokens (address, name, symbol, chain, decimals, logo, meta, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&token.address)
        .bind(&token.name)
        .bind(&token.symbol)
        .bind(token.chain.as_str())
        .bind(token.decimals)
        .bind(&token.logo_uri)
        .bind(Json(&token.meta))
        .bind(token.logo_status.code())
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(())
    }

    async fn tokens_with_logo_status(&self, status: LogoStatus) -> Result<Vec<TokenRecord>> {
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {} FROM tokens WHERE status = $1",
            TOKEN_COLUMNS
        ))
        .bind(status.code())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TokenRecord::try_from).collect()
    }

    async fn update_logo_status(&self, key: &TokenKey, status: LogoStatus) -> Result<()> {
        sqlx::query("UPDATE tokens SET status = $1 WHERE address = $2 AND chain = $3")
            .bind(status.code())
            .bind(&key.address)
            .bind(key.chain.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_logo(&self, key: &TokenKey, logo_uri: &str, status: LogoStatus) -> Result<()> {
        sqlx::query("UPDATE tokens SET logo = $1, status = $2 WHERE address = $3 AND chain = $4")
            .bind(logo_uri)
            .bind(status.code())
            .bind(&key.address)
            .bind(key.chain.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
