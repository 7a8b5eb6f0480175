use crate::{env_or_default, ConfigError, FromEnv};

/// NATS JetStream connection settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NatsConfig {
    /// Server URL, e.g. `nats://localhost:4222`
    pub url: String,
    /// Stream holding the subjects this service consumes and publishes
    pub stream: String,
    /// Suffix appended to consumer and subject names (`stage`, `prod`, ...)
    pub env_tag: String,
    /// Connection name reported to the server
    pub client_name: String,
}

impl NatsConfig {
    pub fn new(url: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: stream.into(),
            env_tag: String::new(),
            client_name: "article-processor".to_string(),
        }
    }

    pub fn with_env_tag(mut self, env_tag: impl Into<String>) -> Self {
        self.env_tag = env_tag.into();
        self
    }

    /// Qualify a consumer or subject name with the env tag.
    ///
    /// Names are left alone when either the tag or the name is empty.
    pub fn tagged(&self, name: &str) -> String {
        if self.env_tag.is_empty() || name.is_empty() {
            return name.to_string();
        }
        format!("{}-{}", name, self.env_tag)
    }
}

impl FromEnv for NatsConfig {
    /// - NATS_URL: defaults to nats://localhost:4222
    /// - NATS_STREAM: defaults to ARTICLES
    /// - ENVIRONMENT: env tag, defaults to stage
    /// - NATS_CLIENT_NAME: defaults to SERVICE_NAME, then article-processor
    fn from_env() -> Result<Self, ConfigError> {
        let service_name = env_or_default("SERVICE_NAME", "article-processor");
        Ok(Self {
            url: env_or_default("NATS_URL", "nats://localhost:4222"),
            stream: env_or_default("NATS_STREAM", "ARTICLES"),
            env_tag: env_or_default("ENVIRONMENT", "stage"),
            client_name: env_or_default("NATS_CLIENT_NAME", &service_name),
        })
    }
}
