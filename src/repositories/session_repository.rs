use crate::models::Session;
use crate::repositories::{map_insert_error, RepositoryResult};
use async_trait::async_trait;
use sqlx::SqlitePool;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &Session) -> RepositoryResult<()>;
    async fn load(&self, session_token: &str) -> RepositoryResult<Option<Session>>;
    async fn delete(&self, session_token: &str) -> RepositoryResult<()>;
}

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn save(&self, session: &Session) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO sessions (session_token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.session_token)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    async fn load(&self, session_token: &str) -> RepositoryResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT session_token, user_id, created_at, expires_at FROM sessions WHERE session_token = ?",
        )
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn delete(&self, session_token: &str) -> RepositoryResult<()> {
        sqlx::query("DELETE FROM sessions WHERE session_token = ?")
            .bind(session_token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
