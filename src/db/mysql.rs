use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::mysql::MysqlConnection;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;

use super::DatabaseError;
use super::models::{Checkin, LineReply, User};
use crate::db::manager::MysqlPool;
use crate::db::schema_mysql::{checkins, line_replies, users};

fn to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(naive, Utc)
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

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
struct DbUser {
    user_id: i64,
    line_user_id: String,
    name: String,
    created_at: NaiveDateTime,
}

impl From<DbUser> for User {
    fn from(value: DbUser) -> Self {
        Self {
            user_id: value.user_id,
            line_user_id: value.line_user_id,
            name: value.name,
            created_at: to_utc(value.created_at),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct NewUser<'a> {
    line_user_id: &'a str,
    name: &'a str,
    created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = checkins)]
struct DbCheckin {
    checkin_id: i64,
    user_id: i64,
    checkin_time: NaiveDateTime,
}

impl From<DbCheckin> for Checkin {
    fn from(value: DbCheckin) -> Self {
        Self {
            checkin_id: value.checkin_id,
            user_id: value.user_id,
            checkin_time: to_utc(value.checkin_time),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = checkins)]
struct NewCheckin {
    user_id: i64,
    checkin_time: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = line_replies)]
struct DbLineReply {
    reply_id: i64,
    user_id: i64,
    reply_message: String,
    reply_time: NaiveDateTime,
}

impl From<DbLineReply> for LineReply {
    fn from(value: DbLineReply) -> Self {
        Self {
            reply_id: value.reply_id,
            user_id: value.user_id,
            reply_message: value.reply_message,
            reply_time: to_utc(value.reply_time),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = line_replies)]
struct NewLineReply<'a> {
    user_id: i64,
    reply_message: &'a str,
    reply_time: NaiveDateTime,
}

async fn with_connection<T, F>(pool: MysqlPool, operation: F) -> Result<T, DatabaseError>
where
    T: Send + 'static,
    F: FnOnce(&mut MysqlConnection) -> Result<T, DatabaseError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        operation(&mut conn)
    })
    .await
    .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
}

pub struct MysqlUserStore {
    pool: MysqlPool,
}

impl MysqlUserStore {
    pub fn new(pool: MysqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::UserStore for MysqlUserStore {
    async fn get_user_by_line_id(&self, line_id: &str) -> Result<Option<User>, DatabaseError> {
        let pool = self.pool.clone();
        let line_id = line_id.to_string();
        with_connection(pool, move |conn| {
            use crate::db::schema_mysql::users::dsl::*;
            users
                .filter(line_user_id.eq(line_id))
                .select(DbUser::as_select())
                .first::<DbUser>(conn)
                .optional()
                .map(|value| value.map(Into::into))
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn get_user_by_id(&self, uid: i64) -> Result<Option<User>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema_mysql::users::dsl::*;
            users
                .filter(user_id.eq(uid))
                .select(DbUser::as_select())
                .first::<DbUser>(conn)
                .optional()
                .map(|value| value.map(Into::into))
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn create_user(&self, line_id: &str, user_name: &str) -> Result<User, DatabaseError> {
        let pool = self.pool.clone();
        let line_id = line_id.to_string();
        let user_name = user_name.to_string();
        with_connection(pool, move |conn| {
            let new_user = NewUser {
                line_user_id: &line_id,
                name: &user_name,
                created_at: Utc::now().naive_utc(),
            };
            diesel::insert_into(users::table)
                .values(&new_user)
                .execute(conn)
                .map_err(|e| map_insert_error(e, "user"))?;

            use crate::db::schema_mysql::users::dsl::*;
            users
                .filter(line_user_id.eq(&line_id))
                .select(DbUser::as_select())
                .first::<DbUser>(conn)
                .map(Into::into)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema_mysql::users::dsl::*;
            users
                .order(user_id.asc())
                .select(DbUser::as_select())
                .load::<DbUser>(conn)
                .map(|rows| rows.into_iter().map(Into::into).collect())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn count_users(&self) -> Result<i64, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema_mysql::users::dsl::*;
            users
                .count()
                .get_result::<i64>(conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }
}

pub struct MysqlCheckinStore {
    pool: MysqlPool,
}

impl MysqlCheckinStore {
    pub fn new(pool: MysqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::CheckinStore for MysqlCheckinStore {
    async fn record_checkin(&self, uid: i64) -> Result<Checkin, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            let new_checkin = NewCheckin {
                user_id: uid,
                checkin_time: Utc::now().naive_utc(),
            };
            diesel::insert_into(checkins::table)
                .values(&new_checkin)
                .execute(conn)
                .map_err(|e| map_insert_error(e, "checkin"))?;

            use crate::db::schema_mysql::checkins::dsl::*;
            checkins
                .filter(user_id.eq(uid))
                .order(checkin_id.desc())
                .select(DbCheckin::as_select())
                .first::<DbCheckin>(conn)
                .map(Into::into)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn list_checkins_for_user(&self, uid: i64) -> Result<Vec<Checkin>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema_mysql::checkins::dsl::*;
            checkins
                .filter(user_id.eq(uid))
                .order((checkin_time.asc(), checkin_id.asc()))
                .select(DbCheckin::as_select())
                .load::<DbCheckin>(conn)
                .map(|rows| rows.into_iter().map(Into::into).collect())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn count_checkins(&self) -> Result<i64, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema_mysql::checkins::dsl::*;
            checkins
                .count()
                .get_result::<i64>(conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }
}

pub struct MysqlReplyStore {
    pool: MysqlPool,
}

impl MysqlReplyStore {
    pub fn new(pool: MysqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::ReplyStore for MysqlReplyStore {
    async fn record_reply(&self, uid: i64, message: &str) -> Result<LineReply, DatabaseError> {
        let pool = self.pool.clone();
        let message = message.to_string();
        with_connection(pool, move |conn| {
            let new_reply = NewLineReply {
                user_id: uid,
                reply_message: &message,
                reply_time: Utc::now().naive_utc(),
            };
            diesel::insert_into(line_replies::table)
                .values(&new_reply)
                .execute(conn)
                .map_err(|e| map_insert_error(e, "reply"))?;

            use crate::db::schema_mysql::line_replies::dsl::*;
            line_replies
                .filter(user_id.eq(uid))
                .order(reply_id.desc())
                .select(DbLineReply::as_select())
                .first::<DbLineReply>(conn)
                .map(Into::into)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn list_replies_for_user(&self, uid: i64) -> Result<Vec<LineReply>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema_mysql::line_replies::dsl::*;
            line_replies
                .filter(user_id.eq(uid))
                .order(reply_id.asc())
                .select(DbLineReply::as_select())
                .load::<DbLineReply>(conn)
                .map(|rows| rows.into_iter().map(Into::into).collect())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }
}
