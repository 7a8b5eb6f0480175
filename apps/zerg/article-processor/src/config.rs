//! Configuration for the article processor

use core_config::{
    ConfigError, DatabaseConfig, Environment, FromEnv, NatsConfig, ServerConfig, env_or_default,
    env_parse_or_default,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub nats: NatsConfig,
    /// Health and metrics listener
    pub server: ServerConfig,
    /// Create the stream and consumer on startup (`NATS_PROVISION`)
    pub provision: bool,
}

impl FromEnv for Config {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            service_name: env_or_default("SERVICE_NAME", "article-processor"),
            environment: Environment::from_env(),
            database: DatabaseConfig::from_env()?,
            nats: NatsConfig::from_env()?,
            server: ServerConfig::from_env()?,
            provision: env_parse_or_default("NATS_PROVISION", false)?,
        })
    }
}

/// Load only what the `publish` command needs.
pub fn publisher_config() -> Result<NatsConfig, ConfigError> {
    NatsConfig::from_env()
}
