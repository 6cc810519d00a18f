use crate::models::user::{normalize_email, User};
use crate::repositories::{map_insert_error, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

const USER_COLUMNS: &str = "id, email, email_verified, created_at, last_login_at";

/// Directory of known users, keyed case-insensitively by email.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;
    async fn create(&self, email: &str) -> RepositoryResult<User>;
    async fn find_or_create(&self, email: &str) -> RepositoryResult<User>;
    /// Stamps `last_login_at` and marks the email as verified.
    async fn update_last_login(&self, email: &str, at: DateTime<Utc>) -> RepositoryResult<()>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE email_normalized = ?", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn create(&self, email: &str) -> RepositoryResult<User> {
        let email = email.trim();
        let result = sqlx::query(
            "INSERT INTO users (email, email_normalized, email_verified, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(email)
        .bind(normalize_email(email))
        .bind(false)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        let id = result.last_insert_rowid();
        tracing::info!(user_id = id, "created user");
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn find_or_create(&self, email: &str) -> RepositoryResult<User> {
        if let Some(user) = self.find_by_email(email).await? {
            return Ok(user);
        }

        match self.create(email).await {
            Ok(user) => Ok(user),
            // Lost a race with a concurrent insert for the same address.
            Err(RepositoryError::AlreadyExists) => self
                .find_by_email(email)
                .await?
                .ok_or(RepositoryError::NotFound),
            Err(e) => Err(e),
        }
    }

    async fn update_last_login(&self, email: &str, at: DateTime<Utc>) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE users SET last_login_at = ?, email_verified = ? WHERE email_normalized = ?",
        )
        .bind(at)
        .bind(true)
        .bind(normalize_email(email))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
