pub mod test_helpers {
    use crate::clock::Clock;
    use crate::config::AuthConfig;
    use crate::repositories::{SqliteSessionStore, SqliteTokenStore, SqliteUserRepository};
    use crate::services::email_service::{EmailError, EmailMessage, EmailService};
    use crate::services::AuthService;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

    pub const TEST_SECRET: &[u8] = b"test-secret-key-for-magic-links";

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing
    /// Useful when several connections must see the same data
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&database_url)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Clock that only moves when told to.
    pub struct TestClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl TestClock {
        pub fn new(now: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn set(&self, now: DateTime<Utc>) {
            *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
            *now += by;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap_or_else(|e| e.into_inner())
        }
    }

    /// Keeps every delivered message for later inspection.
    #[derive(Default)]
    pub struct RecordingEmailService {
        sent: Mutex<Vec<EmailMessage>>,
    }

    impl RecordingEmailService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<EmailMessage> {
            self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    #[async_trait]
    impl EmailService for RecordingEmailService {
        async fn deliver(&self, message: &EmailMessage) -> Result<(), EmailError> {
            self.sent
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(message.clone());
            Ok(())
        }
    }

    pub struct FailingEmailService;

    #[async_trait]
    impl EmailService for FailingEmailService {
        async fn deliver(&self, _message: &EmailMessage) -> Result<(), EmailError> {
            Err(EmailError::SendFailed("connection refused".to_string()))
        }
    }

    pub fn test_config() -> AuthConfig {
        AuthConfig::development(TEST_SECRET.to_vec())
    }

    /// AuthService over SQLite stores, with the given clock and mailer.
    pub fn build_auth_service(
        pool: &SqlitePool,
        clock: Arc<TestClock>,
        email_service: Arc<dyn EmailService>,
    ) -> AuthService {
        AuthService::new(
            &test_config(),
            Arc::new(SqliteTokenStore::new(pool.clone())),
            Arc::new(SqliteUserRepository::new(pool.clone())),
            Arc::new(SqliteSessionStore::new(pool.clone())),
            email_service,
            clock,
        )
    }
}

// Re-export commonly used test functions at module level for convenience
// Note: This is test-only code. Panic on error is acceptable in tests.
#[cfg(test)]
pub async fn create_test_pool() -> sqlx::SqlitePool {
    match test_helpers::create_test_db().await {
        Ok(pool) => pool,
        Err(e) => panic!("Failed to create test pool: {}", e),
    }
}
