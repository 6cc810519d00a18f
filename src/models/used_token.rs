use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UsedToken {
    pub token: String,
    pub email: String,
    pub used_at: DateTime<Utc>,
}
