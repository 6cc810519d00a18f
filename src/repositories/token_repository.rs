use crate::models::UsedToken;
use crate::repositories::{map_insert_error, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Ledger of redeemed magic-link tokens.
///
/// `mark_used` must be atomic per token: a second insert of the same token
/// reports `RepositoryError::AlreadyExists` rather than a generic failure.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait TokenStore: Send + Sync {
    async fn was_used(&self, token: &str) -> RepositoryResult<bool>;
    async fn mark_used(
        &self,
        token: &str,
        email: &str,
        used_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;
    async fn find(&self, token: &str) -> RepositoryResult<Option<UsedToken>>;
    /// Deletes records redeemed before `cutoff`, returning how many were removed.
    async fn purge_used_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64>;
}

pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn was_used(&self, token: &str) -> RepositoryResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM used_tokens WHERE token = ?")
            .bind(token)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn mark_used(
        &self,
        token: &str,
        email: &str,
        used_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        sqlx::query("INSERT INTO used_tokens (token, email, used_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(email)
            .bind(used_at)
            .execute(&self.pool)
            .await
            .map_err(map_insert_error)?;

        Ok(())
    }

    async fn find(&self, token: &str) -> RepositoryResult<Option<UsedToken>> {
        let record = sqlx::query_as::<_, UsedToken>(
            "SELECT token, email, used_at FROM used_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn purge_used_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM used_tokens WHERE used_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
