use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A known handling user a job card can be assigned to.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}
