use super::NatsBroker;
use crate::error::BrokerError;
use crate::propagation::TraceContext;
use async_nats::jetstream::Context;
use async_nats::HeaderMap;
use core_config::NatsConfig;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Publishes JSON events to env-tagged JetStream subjects.
#[derive(Clone)]
pub struct NatsPublisher {
    jetstream: Context,
    config: NatsConfig,
}

impl NatsPublisher {
    pub fn new(jetstream: Context, config: NatsConfig) -> Self {
        Self { jetstream, config }
    }

    pub fn from_broker(broker: &NatsBroker) -> Self {
        Self::new(broker.jetstream().clone(), broker.config().clone())
    }

    /// Serialize `payload` and publish it to `subject` with a fresh `traceparent`.
    ///
    /// Returns the stream sequence of the stored message.
    pub async fn publish_json<T: Serialize>(&self, subject: &str, payload: &T) -> Result<u64, BrokerError> {
        let data = serde_json::to_vec(payload)?;
        let mut attributes = HashMap::new();
        TraceContext::new_root().inject(&mut attributes);
        self.publish(subject, data, &attributes).await
    }

    /// Publish raw bytes with `attributes` as headers and wait for the stream ack.
    pub async fn publish(
        &self,
        subject: &str,
        data: Vec<u8>,
        attributes: &HashMap<String, String>,
    ) -> Result<u64, BrokerError> {
        let subject = self.config.tagged(subject);

        let mut headers = HeaderMap::new();
        for (key, value) in attributes {
            headers.insert(key.as_str(), value.as_str());
        }

        let ack = self
            .jetstream
            .publish_with_headers(subject.clone(), headers, data.into())
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;

        debug!(
            subject = %subject,
            stream = %ack.stream,
            sequence = ack.sequence,
            "Message published"
        );

        Ok(ack.sequence)
    }
}
