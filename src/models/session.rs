use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Server-side record backing the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub session_token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn session_expires_exactly_at_expires_at() {
        let created_at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let session = Session {
            session_token: "abc".to_string(),
            user_id: 1,
            created_at,
            expires_at: created_at + Duration::days(7),
        };

        assert!(session.is_active(created_at));
        assert!(session.is_active(session.expires_at - Duration::milliseconds(1)));
        assert!(!session.is_active(session.expires_at));
    }
}
