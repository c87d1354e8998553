use async_trait::async_trait;

use super::DatabaseError;
use super::models::{Checkin, LineReply, User};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user_by_line_id(
        &self,
        line_user_id: &str,
    ) -> Result<Option<User>, DatabaseError>;
    async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>, DatabaseError>;
    /// Fails with [`DatabaseError::Conflict`] when the `line_user_id` is
    /// already registered.
    async fn create_user(&self, line_user_id: &str, name: &str) -> Result<User, DatabaseError>;
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError>;
    async fn count_users(&self) -> Result<i64, DatabaseError>;
}

#[async_trait]
pub trait CheckinStore: Send + Sync {
    /// Appends one ledger entry stamped with the current time. Repeated calls
    /// produce repeated rows; there is no dedup.
    async fn record_checkin(&self, user_id: i64) -> Result<Checkin, DatabaseError>;
    /// All check-ins for a user in ascending timestamp order.
    async fn list_checkins_for_user(&self, user_id: i64) -> Result<Vec<Checkin>, DatabaseError>;
    async fn count_checkins(&self) -> Result<i64, DatabaseError>;
}

#[async_trait]
pub trait ReplyStore: Send + Sync {
    async fn record_reply(
        &self,
        user_id: i64,
        reply_message: &str,
    ) -> Result<LineReply, DatabaseError>;
    async fn list_replies_for_user(&self, user_id: i64) -> Result<Vec<LineReply>, DatabaseError>;
}
