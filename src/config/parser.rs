use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub line: LineConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LineConfig {
    #[serde(default)]
    pub channel_access_token: String,
    #[serde(default)]
    pub channel_secret: String,
    #[serde(default = "default_line_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub min_connections: Option<u32>,
}

impl DatabaseConfig {
    pub fn db_type(&self) -> DbType {
        let url = self.connection_string();
        if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            DbType::Mysql
        } else {
            DbType::Sqlite
        }
    }

    pub fn connection_string(&self) -> String {
        if let Some(ref url) = self.url {
            url.clone()
        } else if let Some(ref file) = self.filename {
            format!("sqlite://{}", file)
        } else {
            String::new()
        }
    }

    pub fn sqlite_path(&self) -> Option<String> {
        if let DbType::Sqlite = self.db_type() {
            let url = self.connection_string();
            Some(url.strip_prefix("sqlite://").unwrap_or(&url).to_string())
        } else {
            None
        }
    }

    pub fn max_connections(&self) -> Option<u32> {
        match self.db_type() {
            DbType::Mysql => self.max_connections,
            DbType::Sqlite => Some(1),
        }
    }

    pub fn min_connections(&self) -> Option<u32> {
        match self.db_type() {
            DbType::Mysql => self.min_connections,
            DbType::Sqlite => Some(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Sqlite,
    Mysql,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.line.channel_access_token.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "line.channel_access_token cannot be empty".to_string(),
            ));
        }

        if self.line.channel_secret.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "line.channel_secret cannot be empty".to_string(),
            ));
        }

        if self.database.connection_string().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "database connection string cannot be empty (set database.url or database.filename)"
                    .to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.port must be between 1 and 65535".to_string(),
            ));
        }

        if self.limits.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "limits.http_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("LINE_CHANNEL_ACCESS_TOKEN") {
            self.line.channel_access_token = value;
        }
        if let Ok(value) = std::env::var("LINE_CHANNEL_SECRET") {
            self.line.channel_secret = value;
        }
        if let Ok(value) = std::env::var("DATABASE_URL") {
            self.database.url = Some(value);
        }
        if let Ok(value) = std::env::var("PORT")
            && let Ok(port) = value.parse::<u16>()
        {
            self.server.port = port;
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_line_api_base_url() -> String {
    "https://api.line.me".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "plain".to_string()
}

fn default_http_timeout_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
line:
  channel_access_token: "token-abc"
  channel_secret: "secret-xyz"
database:
  filename: "checkin.db"
"#
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.line.api_base_url, "https://api.line.me");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.limits.http_timeout_secs, 5);
        config.validate().unwrap();
    }

    #[test]
    fn filename_maps_to_sqlite() {
        let config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert_eq!(config.database.db_type(), DbType::Sqlite);
        assert_eq!(config.database.sqlite_path().as_deref(), Some("checkin.db"));
        assert_eq!(config.database.max_connections(), Some(1));
    }

    #[test]
    fn mysql_url_maps_to_mysql() {
        let yaml = r#"
line:
  channel_access_token: "token"
  channel_secret: "secret"
database:
  url: "mysql://root:pw@localhost:3306/checkin"
  max_connections: 8
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.database.db_type(), DbType::Mysql);
        assert_eq!(config.database.sqlite_path(), None);
        assert_eq!(config.database.max_connections(), Some(8));
    }

    #[test]
    fn missing_channel_secret_fails_validation() {
        let yaml = r#"
line:
  channel_access_token: "token"
database:
  filename: "checkin.db"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_database_section_fails_validation() {
        let yaml = r#"
line:
  channel_access_token: "token"
  channel_secret: "secret"
database: {}
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }
}
