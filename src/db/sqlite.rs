use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel::sqlite::SqliteConnection;

use super::DatabaseError;
use super::models::{Checkin, LineReply, User};
use crate::db::schema_sqlite::{checkins, line_replies, users};

// Helper function to convert DateTime to ISO string for SQLite
fn datetime_to_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// Helper function to parse ISO string to DateTime
fn string_to_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Query(format!("invalid datetime format: {}", e)))
}

fn map_insert_error(e: diesel::result::Error, what: &str) -> DatabaseError {
    match e {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            DatabaseError::Conflict(format!("{what} already exists"))
        }
        diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            DatabaseError::NotFound(format!("{what} references a missing user"))
        }
        other => DatabaseError::Query(other.to_string()),
    }
}

// SQLite uses i32 for INTEGER primary keys, but the store API keeps i64
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
struct DbUser {
    user_id: i32,
    line_user_id: String,
    name: String,
    created_at: String,
}

impl DbUser {
    fn to_user(&self) -> Result<User, DatabaseError> {
        Ok(User {
            user_id: self.user_id as i64,
            line_user_id: self.line_user_id.clone(),
            name: self.name.clone(),
            created_at: string_to_datetime(&self.created_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct NewUser<'a> {
    line_user_id: &'a str,
    name: &'a str,
    created_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = checkins)]
struct DbCheckin {
    checkin_id: i32,
    user_id: i32,
    checkin_time: String,
}

impl DbCheckin {
    fn to_checkin(&self) -> Result<Checkin, DatabaseError> {
        Ok(Checkin {
            checkin_id: self.checkin_id as i64,
            user_id: self.user_id as i64,
            checkin_time: string_to_datetime(&self.checkin_time)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = checkins)]
struct NewCheckin {
    user_id: i32,
    checkin_time: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = line_replies)]
struct DbLineReply {
    reply_id: i32,
    user_id: i32,
    reply_message: String,
    reply_time: String,
}

impl DbLineReply {
    fn to_line_reply(&self) -> Result<LineReply, DatabaseError> {
        Ok(LineReply {
            reply_id: self.reply_id as i64,
            user_id: self.user_id as i64,
            reply_message: self.reply_message.clone(),
            reply_time: string_to_datetime(&self.reply_time)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = line_replies)]
struct NewLineReply<'a> {
    user_id: i32,
    reply_message: &'a str,
    reply_time: String,
}

fn establish_connection(path: &str) -> Result<SqliteConnection, DatabaseError> {
    let mut conn =
        SqliteConnection::establish(path).map_err(|e| DatabaseError::Connection(e.to_string()))?;
    diesel::sql_query("PRAGMA foreign_keys = ON")
        .execute(&mut conn)
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;
    Ok(conn)
}

pub struct SqliteUserStore {
    db_path: Arc<String>,
}

impl SqliteUserStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::UserStore for SqliteUserStore {
    async fn get_user_by_line_id(
        &self,
        line_id: &str,
    ) -> Result<Option<User>, DatabaseError> {
        let line_id = line_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::users::dsl::*;
            users
                .filter(line_user_id.eq(line_id))
                .select(DbUser::as_select())
                .first::<DbUser>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|u| u.to_user())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_user_by_id(&self, uid: i64) -> Result<Option<User>, DatabaseError> {
        let uid = uid as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::users::dsl::*;
            users
                .filter(user_id.eq(uid))
                .select(DbUser::as_select())
                .first::<DbUser>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|u| u.to_user())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn create_user(&self, line_id: &str, user_name: &str) -> Result<User, DatabaseError> {
        let line_id = line_id.to_string();
        let user_name = user_name.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let new_user = NewUser {
                line_user_id: &line_id,
                name: &user_name,
                created_at: datetime_to_string(&Utc::now()),
            };
            diesel::insert_into(crate::db::schema_sqlite::users::table)
                .values(&new_user)
                .execute(&mut conn)
                .map_err(|e| map_insert_error(e, "user"))?;

            use crate::db::schema_sqlite::users::dsl::*;
            users
                .filter(line_user_id.eq(&line_id))
                .select(DbUser::as_select())
                .first::<DbUser>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .to_user()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::users::dsl::*;
            users
                .order(user_id.asc())
                .select(DbUser::as_select())
                .load::<DbUser>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .iter()
                .map(|u| u.to_user())
                .collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn count_users(&self) -> Result<i64, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::users::dsl::*;
            users
                .count()
                .get_result::<i64>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteCheckinStore {
    db_path: Arc<String>,
}

impl SqliteCheckinStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::CheckinStore for SqliteCheckinStore {
    async fn record_checkin(&self, uid: i64) -> Result<Checkin, DatabaseError> {
        let uid = uid as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let new_checkin = NewCheckin {
                user_id: uid,
                checkin_time: datetime_to_string(&Utc::now()),
            };
            diesel::insert_into(crate::db::schema_sqlite::checkins::table)
                .values(&new_checkin)
                .execute(&mut conn)
                .map_err(|e| map_insert_error(e, "checkin"))?;

            use crate::db::schema_sqlite::checkins::dsl::*;
            checkins
                .filter(user_id.eq(uid))
                .order(checkin_id.desc())
                .select(DbCheckin::as_select())
                .first::<DbCheckin>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .to_checkin()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_checkins_for_user(&self, uid: i64) -> Result<Vec<Checkin>, DatabaseError> {
        let uid = uid as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::checkins::dsl::*;
            checkins
                .filter(user_id.eq(uid))
                .order((checkin_time.asc(), checkin_id.asc()))
                .select(DbCheckin::as_select())
                .load::<DbCheckin>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .iter()
                .map(|c| c.to_checkin())
                .collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn count_checkins(&self) -> Result<i64, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::checkins::dsl::*;
            checkins
                .count()
                .get_result::<i64>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteReplyStore {
    db_path: Arc<String>,
}

impl SqliteReplyStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::ReplyStore for SqliteReplyStore {
    async fn record_reply(
        &self,
        uid: i64,
        message: &str,
    ) -> Result<LineReply, DatabaseError> {
        let uid = uid as i32;
        let message = message.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let new_reply = NewLineReply {
                user_id: uid,
                reply_message: &message,
                reply_time: datetime_to_string(&Utc::now()),
            };
            diesel::insert_into(crate::db::schema_sqlite::line_replies::table)
                .values(&new_reply)
                .execute(&mut conn)
                .map_err(|e| map_insert_error(e, "reply"))?;

            use crate::db::schema_sqlite::line_replies::dsl::*;
            line_replies
                .filter(user_id.eq(uid))
                .order(reply_id.desc())
                .select(DbLineReply::as_select())
                .first::<DbLineReply>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .to_line_reply()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_replies_for_user(&self, uid: i64) -> Result<Vec<LineReply>, DatabaseError> {
        let uid = uid as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::line_replies::dsl::*;
            line_replies
                .filter(user_id.eq(uid))
                .order(reply_id.asc())
                .select(DbLineReply::as_select())
                .load::<DbLineReply>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .iter()
                .map(|r| r.to_line_reply())
                .collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::db::stores::{CheckinStore, ReplyStore, UserStore};
    use crate::db::DatabaseManager;

    async fn temp_db() -> (TempDir, DatabaseManager) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db").to_string_lossy().into_owned();
        let manager = DatabaseManager::new_sqlite(path);
        manager.migrate().await.unwrap();
        (dir, manager)
    }

    #[tokio::test]
    async fn create_and_fetch_user_round_trips() {
        let (_dir, db) = temp_db().await;
        let store = db.user_store();

        let created = store.create_user("U100", "Alice").await.unwrap();
        assert_eq!(created.line_user_id, "U100");
        assert_eq!(created.name, "Alice");

        let fetched = store.get_user_by_line_id("U100").await.unwrap().unwrap();
        assert_eq!(fetched.user_id, created.user_id);

        let by_id = store.get_user_by_id(created.user_id).await.unwrap();
        assert!(by_id.is_some());
        assert!(store.get_user_by_line_id("U999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_line_user_id_is_a_conflict() {
        let (_dir, db) = temp_db().await;
        let store = db.user_store();

        store.create_user("U100", "Alice").await.unwrap();
        let err = store.create_user("U100", "Someone else").await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn checkins_are_listed_in_ascending_order() {
        let (_dir, db) = temp_db().await;
        let user = db.user_store().create_user("U100", "Alice").await.unwrap();
        let store = db.checkin_store();

        let first = store.record_checkin(user.user_id).await.unwrap();
        let second = store.record_checkin(user.user_id).await.unwrap();
        assert_eq!(first.user_id, user.user_id);

        let listed = store.list_checkins_for_user(user.user_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].checkin_id, first.checkin_id);
        assert_eq!(listed[1].checkin_id, second.checkin_id);
        assert!(listed[0].checkin_time <= listed[1].checkin_time);
        assert_eq!(store.count_checkins().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn checkin_for_missing_user_violates_foreign_key() {
        let (_dir, db) = temp_db().await;
        let err = db.checkin_store().record_checkin(42).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn replies_are_recorded_per_user() {
        let (_dir, db) = temp_db().await;
        let user = db.user_store().create_user("U100", "Alice").await.unwrap();
        let store = db.reply_store();

        store.record_reply(user.user_id, "hello").await.unwrap();
        store.record_reply(user.user_id, "again").await.unwrap();

        let replies = store.list_replies_for_user(user.user_id).await.unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].reply_message, "hello");
        assert_eq!(replies[1].reply_message, "again");
    }
}
