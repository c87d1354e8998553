use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered bot user, keyed by the LINE platform's opaque user id.
/// Rows are insert-only: a user is never mutated or deleted after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub line_user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One check-in ledger entry, stamped at processing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkin {
    pub checkin_id: i64,
    pub user_id: i64,
    pub checkin_time: DateTime<Utc>,
}

/// Audit record for a reply sent through the explicit reply API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineReply {
    pub reply_id: i64,
    pub user_id: i64,
    pub reply_message: String,
    pub reply_time: DateTime<Utc>,
}
