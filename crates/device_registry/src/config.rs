use common::postgres::PostgresConfig;
use common::telemetry::LogFormat;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

/// Where device records live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output: json or pretty
    #[serde(default)]
    pub log_format: LogFormat,

    // HTTP configuration
    #[serde(default = "default_http_host")]
    pub http_host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// CORS allowed origins (comma-separated list, "*" for all origins)
    #[serde(default = "default_http_cors_allowed_origins")]
    pub http_cors_allowed_origins: String,

    /// Paths excluded from request logging (comma-separated)
    #[serde(default = "default_http_ignored_paths")]
    pub http_ignored_paths: String,

    #[serde(default)]
    pub storage_backend: StorageBackend,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Maximum connections held by the pool
    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Path to PostgreSQL migrations directory
    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    /// Path to goose binary
    #[serde(default = "default_postgres_goose_binary_path")]
    pub postgres_goose_binary_path: String,

    /// Apply pending migrations before serving
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,

    // Pagination
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Seconds allowed for cleanup after a shutdown signal
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_cors_allowed_origins() -> String {
    "*".to_string()
}

fn default_http_ignored_paths() -> String {
    "/health".to_string()
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "devices".to_string()
}

fn default_postgres_username() -> String {
    "devices".to_string()
}

fn default_postgres_password() -> String {
    "devices".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_postgres_migrations_dir() -> String {
    "migrations/postgres".to_string()
}

fn default_postgres_goose_binary_path() -> String {
    "goose".to_string()
}

fn default_run_migrations() -> bool {
    true
}

fn default_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    100
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    /// Load configuration from `DEVICE_REGISTRY_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("DEVICE_REGISTRY"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Requires `1 <= default_page_size <= max_page_size`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size == 0 {
            return Err(ConfigError::Message(
                "max_page_size must be at least 1".to_string(),
            ));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::Message(format!(
                "default_page_size must be between 1 and max_page_size ({}), got {}",
                self.max_page_size, self.default_page_size
            )));
        }
        Ok(())
    }

    pub fn postgres(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            migrations_dir: self.postgres_migrations_dir.clone(),
            goose_binary_path: self.postgres_goose_binary_path.clone(),
        }
    }
}
