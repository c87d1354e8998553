pub use self::parser::{
    Config, DatabaseConfig, DbType, LimitsConfig, LineConfig, LoggingConfig, ServerConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
