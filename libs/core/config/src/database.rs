use crate::{env_or_default, env_parse_or_default, env_required, ConfigError, FromEnv};
use std::env;

/// Postgres connection settings
///
/// `DATABASE_URL` takes precedence. Without it the URL is assembled from the
/// individual `DATABASE_*` parts.
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
        }
    }

    /// Build a connection URL from its parts.
    ///
    /// `options` is appended verbatim, so it carries its own leading `?`.
    pub fn from_parts(
        user: &str,
        password: &str,
        host: &str,
        port: u16,
        name: &str,
        options: &str,
    ) -> Self {
        Self::new(format!(
            "postgres://{user}:{password}@{host}:{port}/{name}{options}"
        ))
    }
}

impl FromEnv for DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = match env::var("DATABASE_URL") {
            Ok(url) => Self::new(url),
            Err(_) => Self::from_parts(
                &env_required("DATABASE_USER")?,
                &env_required("DATABASE_PASSWORD")?,
                &env_or_default("DATABASE_HOST", "127.0.0.1"),
                env_parse_or_default("DATABASE_PORT", 5432)?,
                &env_required("DATABASE_NAME")?,
                &env_or_default("DATABASE_OPTIONS", "?sslmode=disable"),
            ),
        };
        config.max_connections = env_parse_or_default("DATABASE_MAX_CONNECTIONS", 10)?;
        Ok(config)
    }
}
