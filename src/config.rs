use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub nats: NatsConfig,
    pub parser: ParserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// First listing page of the catalog; subsequent pages append `&page=N`.
    pub url: String,
    pub interval_seconds: u64,
    pub page_delay_seconds: u64,
    /// Hard bound for open-ended walks.
    pub max_pages: u32,
    pub request_timeout: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "WATCHER_"
            .add_source(Environment::with_prefix("WATCHER").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "Server port must be greater than 0".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if Url::parse(&self.parser.url).is_err() {
            return Err(ConfigError::Message("Invalid parser URL format".into()));
        }

        if Url::parse(&self.nats.url).is_err() {
            return Err(ConfigError::Message("Invalid NATS URL format".into()));
        }

        if self.parser.interval_seconds == 0 {
            return Err(ConfigError::Message(
                "Parser interval_seconds must be greater than 0".into(),
            ));
        }

        if self.parser.max_pages == 0 {
            return Err(ConfigError::Message(
                "Parser max_pages must be greater than 0".into(),
            ));
        }

        if self.parser.request_timeout == 0 {
            return Err(ConfigError::Message(
                "Parser request_timeout must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}
