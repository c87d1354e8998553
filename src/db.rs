pub use self::error::DatabaseError;
pub use self::manager::DatabaseManager;
pub use self::models::{Checkin, LineReply, User};
pub use self::stores::{CheckinStore, ReplyStore, UserStore};

pub mod error;
pub mod manager;
pub mod models;
pub mod stores;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub mod schema_sqlite;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "mysql")]
pub mod schema_mysql;
