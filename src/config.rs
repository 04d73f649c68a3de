//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub settlement: SettlementConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Settlement worker cadence and grace windows
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// How often the requery worker scans for stuck vends (seconds)
    pub requery_interval: u64,
    /// How long a pending vend is left alone before requerying (seconds)
    pub requery_grace: u64,
    /// Max pending transactions picked up per requery sweep
    pub requery_batch_size: i64,
    /// Requery attempts per transaction before it is flagged for manual review
    pub requery_max_attempts: u32,
    /// How often failed webhook events are re-driven (seconds)
    pub webhook_retry_interval: u64,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            settlement: SettlementConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.settlement.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("PORT cannot be 0".to_string()));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl SettlementConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(SettlementConfig {
            requery_interval: env::var("REQUERY_INTERVAL_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("REQUERY_INTERVAL_SECS".to_string()))?,
            requery_grace: env::var("REQUERY_GRACE_SECS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("REQUERY_GRACE_SECS".to_string()))?,
            requery_batch_size: env::var("REQUERY_BATCH_SIZE")
                .unwrap_or_else(|_| "25".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("REQUERY_BATCH_SIZE".to_string()))?,
            requery_max_attempts: env::var("REQUERY_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("REQUERY_MAX_ATTEMPTS".to_string()))?,
            webhook_retry_interval: env::var("WEBHOOK_RETRY_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("WEBHOOK_RETRY_INTERVAL_SECS".to_string())
                })?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.requery_interval == 0 {
            return Err(ConfigError::InvalidValue(
                "REQUERY_INTERVAL_SECS cannot be 0".to_string(),
            ));
        }

        if self.requery_batch_size <= 0 {
            return Err(ConfigError::InvalidValue(
                "REQUERY_BATCH_SIZE must be positive".to_string(),
            ));
        }

        if self.requery_max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "REQUERY_MAX_ATTEMPTS cannot be 0".to_string(),
            ));
        }

        if self.webhook_retry_interval == 0 {
            return Err(ConfigError::InvalidValue(
                "WEBHOOK_RETRY_INTERVAL_SECS cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

impl From<std::num::ParseIntError> for ConfigError {
    fn from(_: std::num::ParseIntError) -> Self {
        ConfigError::InvalidValue("Failed to parse integer value".to_string())
    }
}
