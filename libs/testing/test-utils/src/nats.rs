//! NATS test infrastructure
//!
//! Provides a `TestNats` helper that starts a NATS server with JetStream enabled.

use async_nats::Client;
use async_nats::jetstream;
use core_config::NatsConfig;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::nats::Nats;

/// Env tag used by [`TestNats::config`]
pub const TEST_ENV_TAG: &str = "test";

/// Test NATS wrapper that ensures proper cleanup
///
/// The container is automatically stopped and removed when this struct is dropped.
///
/// # Example
///
/// ```no_run
/// use test_utils::TestNats;
///
/// # async fn example() {
/// let nats = TestNats::new().await;
/// let config = nats.config("ARTICLES");
/// let jetstream = nats.jetstream();
/// # }
/// ```
pub struct TestNats {
    #[allow(dead_code)]
    container: ContainerAsync<Nats>,
    client: Client,
    pub connection_string: String,
}

impl TestNats {
    /// Start NATS with JetStream (`-js`)
    pub async fn new() -> Self {
        let container = Nats::default()
            .with_tag("latest")
            .with_cmd(["-js"])
            .start()
            .await
            .expect("Failed to start NATS container");

        let host_port = container
            .get_host_port_ipv4(4222)
            .await
            .expect("Failed to get NATS port");

        let connection_string = format!("nats://127.0.0.1:{}", host_port);

        let client = async_nats::connect(&connection_string)
            .await
            .expect("Failed to connect to NATS");

        tracing::info!(port = host_port, "Test NATS ready with JetStream");

        Self {
            container,
            client,
            connection_string,
        }
    }

    /// Get a cloned client (useful for passing to services)
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn jetstream(&self) -> jetstream::Context {
        jetstream::new(self.client.clone())
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Broker configuration pointing at this server, tagged with [`TEST_ENV_TAG`]
    pub fn config(&self, stream: &str) -> NatsConfig {
        NatsConfig::new(&self.connection_string, stream).with_env_tag(TEST_ENV_TAG)
    }

    /// Number of messages currently stored in `stream`
    pub async fn stream_messages(&self, stream: &str) -> u64 {
        let mut stream = self
            .jetstream()
            .get_stream(stream)
            .await
            .expect("Failed to get stream");
        stream
            .info()
            .await
            .expect("Failed to get stream info")
            .state
            .messages
    }
}

// Container is automatically cleaned up when TestNats is dropped
impl Drop for TestNats {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test NATS container");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_nats::jetstream::stream;

    #[tokio::test]
    async fn test_jetstream_stream_roundtrip() {
        let nats = TestNats::new().await;
        let jetstream = nats.jetstream();

        jetstream
            .create_stream(stream::Config {
                name: "TEST_STREAM".to_string(),
                subjects: vec!["test.>".to_string()],
                ..Default::default()
            })
            .await
            .expect("Failed to create stream");

        let ack = jetstream
            .publish("test.hello", "world".into())
            .await
            .expect("Failed to publish")
            .await
            .expect("Failed to get ack");

        assert!(ack.sequence > 0);
        assert_eq!(nats.stream_messages("TEST_STREAM").await, 1);
    }

    #[test]
    fn test_config_is_tagged() {
        let config = NatsConfig::new("nats://127.0.0.1:4222", "ARTICLES").with_env_tag(TEST_ENV_TAG);
        assert_eq!(config.tagged("add-article-sub"), "add-article-sub-test");
    }
}
