use crate::error::AuthError;
use crate::models::Session;
use crate::repositories::SessionStore;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use std::sync::Arc;

/// Bytes of entropy in a session token (hex encoded on the wire).
const SESSION_TOKEN_BYTES: usize = 32;

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    lifetime: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, lifetime: Duration) -> Self {
        Self { store, lifetime }
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; SESSION_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues and persists a new session for `user_id`. No retry on store failure.
    pub async fn create(&self, user_id: i64, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let expires_at = now.checked_add_signed(self.lifetime).ok_or_else(|| {
            tracing::error!(user_id, lifetime = %self.lifetime, "session expiry out of range");
            AuthError::SessionCreation("session lifetime out of range".to_string())
        })?;

        let session = Session {
            session_token: Self::generate_token(),
            user_id,
            created_at: now,
            expires_at,
        };

        self.store.save(&session).await.map_err(|e| {
            tracing::error!(user_id, error = %e, "failed to persist session");
            AuthError::SessionCreation(e.to_string())
        })?;

        tracing::debug!(user_id, expires_at = %session.expires_at, "session created");
        Ok(session)
    }

    /// Returns the session only while `now < expires_at`.
    pub async fn validate(
        &self,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, AuthError> {
        let session = self.store.load(session_token).await?;
        Ok(session.filter(|s| s.is_active(now)))
    }

    pub async fn revoke(&self, session_token: &str) -> Result<(), AuthError> {
        self.store.delete(session_token).await?;
        Ok(())
    }
}
