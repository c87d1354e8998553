use std::sync::Arc;

#[cfg(any(feature = "sqlite", feature = "mysql"))]
use diesel::RunQueryDsl;
#[cfg(feature = "mysql")]
use diesel::mysql::MysqlConnection;
#[cfg(feature = "mysql")]
use diesel::r2d2::{self, ConnectionManager};
#[cfg(feature = "sqlite")]
use diesel::Connection;
#[cfg(feature = "sqlite")]
use diesel::sqlite::SqliteConnection;

use crate::config::{DatabaseConfig, DbType as ConfigDbType};
#[cfg(feature = "mysql")]
use crate::db::mysql::{MysqlCheckinStore, MysqlReplyStore, MysqlUserStore};
#[cfg(feature = "sqlite")]
use crate::db::sqlite::{SqliteCheckinStore, SqliteReplyStore, SqliteUserStore};
use crate::db::{CheckinStore, DatabaseError, ReplyStore, UserStore};

#[cfg(feature = "mysql")]
pub type MysqlPool = r2d2::Pool<ConnectionManager<MysqlConnection>>;

#[derive(Clone)]
pub struct DatabaseManager {
    #[cfg(feature = "sqlite")]
    sqlite_path: Option<String>,
    #[cfg(feature = "mysql")]
    mysql_pool: Option<MysqlPool>,
    user_store: Arc<dyn UserStore>,
    checkin_store: Arc<dyn CheckinStore>,
    reply_store: Arc<dyn ReplyStore>,
    db_type: DbType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbType {
    Sqlite,
    Mysql,
}

impl From<ConfigDbType> for DbType {
    fn from(value: ConfigDbType) -> Self {
        match value {
            ConfigDbType::Sqlite => DbType::Sqlite,
            ConfigDbType::Mysql => DbType::Mysql,
        }
    }
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let db_type = DbType::from(config.db_type());

        match db_type {
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = config.sqlite_path().ok_or_else(|| {
                    DatabaseError::Connection("missing sqlite path".to_string())
                })?;
                Ok(Self::new_sqlite(path))
            }
            #[cfg(feature = "mysql")]
            DbType::Mysql => {
                let manager =
                    ConnectionManager::<MysqlConnection>::new(config.connection_string());

                let pool = r2d2::Pool::builder()
                    .max_size(config.max_connections().unwrap_or(10))
                    .min_idle(Some(config.min_connections().unwrap_or(1)))
                    .build(manager)
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;

                let user_store = Arc::new(MysqlUserStore::new(pool.clone()));
                let checkin_store = Arc::new(MysqlCheckinStore::new(pool.clone()));
                let reply_store = Arc::new(MysqlReplyStore::new(pool.clone()));

                Ok(Self {
                    #[cfg(feature = "sqlite")]
                    sqlite_path: None,
                    mysql_pool: Some(pool),
                    user_store,
                    checkin_store,
                    reply_store,
                    db_type,
                })
            }
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Connection(
                "SQLite feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "mysql"))]
            DbType::Mysql => Err(DatabaseError::Connection(
                "MySQL feature not enabled".to_string(),
            )),
        }
    }

    #[cfg(feature = "sqlite")]
    pub fn new_sqlite(path: String) -> Self {
        let path_arc = Arc::new(path.clone());

        let user_store = Arc::new(SqliteUserStore::new(path_arc.clone()));
        let checkin_store = Arc::new(SqliteCheckinStore::new(path_arc.clone()));
        let reply_store = Arc::new(SqliteReplyStore::new(path_arc));

        Self {
            sqlite_path: Some(path),
            #[cfg(feature = "mysql")]
            mysql_pool: None,
            user_store,
            checkin_store,
            reply_store,
            db_type: DbType::Sqlite,
        }
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        match self.db_type {
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = self.sqlite_path.as_ref().ok_or_else(|| {
                    DatabaseError::Migration("sqlite path not configured".to_string())
                })?;
                Self::migrate_sqlite(path).await
            }
            #[cfg(feature = "mysql")]
            DbType::Mysql => {
                let pool = self.mysql_pool.as_ref().ok_or_else(|| {
                    DatabaseError::Migration("mysql pool not configured".to_string())
                })?;
                Self::migrate_mysql(pool).await
            }
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Migration(
                "SQLite feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "mysql"))]
            DbType::Mysql => Err(DatabaseError::Migration(
                "MySQL feature not enabled".to_string(),
            )),
        }
    }

    #[cfg(feature = "sqlite")]
    async fn migrate_sqlite(path: &str) -> Result<(), DatabaseError> {
        let path = path.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = SqliteConnection::establish(&path)
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    line_user_id TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS checkins (
                    checkin_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(user_id),
                    checkin_time TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS line_replies (
                    reply_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(user_id),
                    reply_message TEXT NOT NULL,
                    reply_time TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_users_line_user_id ON users(line_user_id)",
                "CREATE INDEX IF NOT EXISTS idx_checkins_user_id ON checkins(user_id)",
                "CREATE INDEX IF NOT EXISTS idx_checkins_time ON checkins(checkin_time)",
                "CREATE INDEX IF NOT EXISTS idx_line_replies_user_id ON line_replies(user_id)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    #[cfg(feature = "mysql")]
    async fn migrate_mysql(pool: &MysqlPool) -> Result<(), DatabaseError> {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    user_id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                    line_user_id VARCHAR(255) NOT NULL UNIQUE,
                    name VARCHAR(255) NOT NULL,
                    created_at DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6)
                ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS checkins (
                    checkin_id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                    user_id BIGINT NOT NULL,
                    checkin_time DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
                    KEY idx_checkins_user_id (user_id),
                    KEY idx_checkins_time (checkin_time),
                    CONSTRAINT fk_checkins_user
                        FOREIGN KEY (user_id) REFERENCES users(user_id)
                ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS line_replies (
                    reply_id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                    user_id BIGINT NOT NULL,
                    reply_message TEXT NOT NULL,
                    reply_time DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
                    KEY idx_line_replies_user_id (user_id),
                    CONSTRAINT fk_line_replies_user
                        FOREIGN KEY (user_id) REFERENCES users(user_id)
                ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
                "#,
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    pub fn user_store(&self) -> Arc<dyn UserStore> {
        self.user_store.clone()
    }

    pub fn checkin_store(&self) -> Arc<dyn CheckinStore> {
        self.checkin_store.clone()
    }

    pub fn reply_store(&self) -> Arc<dyn ReplyStore> {
        self.reply_store.clone()
    }
}
