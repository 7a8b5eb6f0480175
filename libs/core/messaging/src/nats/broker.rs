use crate::broker::{Broker, Subscription};
use crate::error::BrokerError;
use crate::handler::BoxHandler;
use crate::message::{Acker, Message};
use async_nats::jetstream::consumer::pull::{Config as PullConfig, MessagesErrorKind};
use async_nats::jetstream::consumer::{AckPolicy, Consumer};
use async_nats::jetstream::stream::Config as StreamConfig;
use async_nats::jetstream::{self, AckKind, Context};
use async_trait::async_trait;
use core_config::NatsConfig;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Broker backed by JetStream durable pull consumers.
#[derive(Clone)]
pub struct NatsBroker {
    jetstream: Context,
    config: NatsConfig,
}

impl NatsBroker {
    pub fn new(client: async_nats::Client, config: NatsConfig) -> Self {
        Self {
            jetstream: jetstream::new(client),
            config,
        }
    }

    /// Connect to `config.url` using `config.client_name` as connection name.
    pub async fn connect(config: &NatsConfig) -> Result<Self, BrokerError> {
        let client = async_nats::ConnectOptions::new()
            .name(&config.client_name)
            .connect(&config.url)
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        info!(url = %config.url, stream = %config.stream, "Connected to NATS");

        Ok(Self::new(client, config.clone()))
    }

    pub fn jetstream(&self) -> &Context {
        &self.jetstream
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    /// Create the stream and a durable consumer for `subscription_id` when missing.
    ///
    /// The stream captures the env-tagged `subject`; the consumer is named
    /// after the env-tagged subscription id and filters on that subject.
    pub async fn provision(
        &self,
        subscription_id: &str,
        subject: &str,
        options: &ProvisionOptions,
    ) -> Result<(), BrokerError> {
        let subject = self.config.tagged(subject);
        let durable = self.config.tagged(subscription_id);

        let stream = match self.jetstream.get_stream(&self.config.stream).await {
            Ok(mut stream) => {
                let info = stream
                    .info()
                    .await
                    .map_err(|e| BrokerError::Connection(e.to_string()))?;
                if !info.config.subjects.contains(&subject) {
                    let mut config = info.config.clone();
                    config.subjects.push(subject.clone());
                    self.jetstream
                        .update_stream(config)
                        .await
                        .map_err(|e| BrokerError::Connection(e.to_string()))?;
                    debug!(stream = %self.config.stream, subject = %subject, "Subject added to stream");
                }
                stream
            }
            Err(_) => {
                info!(stream = %self.config.stream, subject = %subject, "Creating stream");
                self.jetstream
                    .create_stream(StreamConfig {
                        name: self.config.stream.clone(),
                        subjects: vec![subject.clone()],
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| BrokerError::Connection(e.to_string()))?
            }
        };

        if stream.get_consumer::<PullConfig>(&durable).await.is_ok() {
            debug!(consumer = %durable, "Consumer already exists");
            return Ok(());
        }

        info!(consumer = %durable, stream = %self.config.stream, "Creating consumer");
        stream
            .create_consumer(PullConfig {
                durable_name: Some(durable.clone()),
                name: Some(durable),
                ack_policy: AckPolicy::Explicit,
                ack_wait: options.ack_wait,
                max_deliver: options.max_deliver,
                backoff: options.backoff.clone(),
                filter_subject: subject,
                ..Default::default()
            })
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        Ok(())
    }
}

/// Consumer settings used by [`NatsBroker::provision`].
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    pub ack_wait: Duration,
    /// Total delivery attempts, `-1` for unlimited
    pub max_deliver: i64,
    /// Redelivery delays after a nack or ack timeout
    pub backoff: Vec<Duration>,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            ack_wait: Duration::from_secs(30),
            max_deliver: 5,
            backoff: vec![Duration::from_secs(1), Duration::from_secs(5), Duration::from_secs(15)],
        }
    }
}

#[async_trait]
impl Broker for NatsBroker {
    async fn subscription(&self, id: &str) -> Result<Box<dyn Subscription>, BrokerError> {
        let name = self.config.tagged(id);

        let stream = self
            .jetstream
            .get_stream(&self.config.stream)
            .await
            .map_err(|e| BrokerError::not_found(&name, format!("stream '{}': {}", self.config.stream, e)))?;

        let consumer = stream
            .get_consumer::<PullConfig>(&name)
            .await
            .map_err(|e| BrokerError::not_found(&name, e.to_string()))?;

        Ok(Box::new(NatsSubscription {
            id: name,
            consumer,
            max_outstanding: 1,
        }))
    }
}

/// Durable pull consumer.
pub struct NatsSubscription {
    id: String,
    consumer: Consumer<PullConfig>,
    max_outstanding: usize,
}

#[async_trait]
impl Subscription for NatsSubscription {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_max_outstanding(&mut self, max: usize) {
        self.max_outstanding = max.max(1);
    }

    fn max_outstanding(&self) -> usize {
        self.max_outstanding
    }

    async fn receive(&self, ctx: CancellationToken, handler: BoxHandler) -> Result<(), BrokerError> {
        let messages = self
            .consumer
            .stream()
            .max_messages_per_batch(self.max_outstanding)
            .messages()
            .await
            .map_err(|e| BrokerError::Receive {
                id: self.id.clone(),
                details: e.to_string(),
            })?;

        // Cancelled on shutdown or when the consumer disappears
        let intake = ctx.child_token();
        let fatal: Mutex<Option<BrokerError>> = Mutex::new(None);

        messages
            .take_until(intake.clone().cancelled_owned())
            .for_each_concurrent(self.max_outstanding, |delivery| {
                let handler = &handler;
                let ctx = &ctx;
                let intake = &intake;
                let fatal = &fatal;
                async move {
                    match delivery {
                        Ok(message) => {
                            let mut msg = into_message(message);
                            handler.handle(ctx, &mut msg).await;
                        }
                        Err(e) if matches!(e.kind(), MessagesErrorKind::ConsumerDeleted) => {
                            warn!(subscription = %self.id, error = %e, "Consumer deleted");
                            if let Ok(mut slot) = fatal.lock() {
                                slot.get_or_insert(BrokerError::SubscriptionClosed(self.id.clone()));
                            }
                            intake.cancel();
                        }
                        Err(e) => {
                            warn!(subscription = %self.id, error = %e, "Error receiving message");
                        }
                    }
                }
            })
            .await;

        match fatal.into_inner().ok().flatten() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn into_message(message: jetstream::Message) -> Message {
    let mut attributes = HashMap::new();
    if let Some(headers) = &message.headers {
        for (name, values) in headers.iter() {
            if let Some(value) = values.first() {
                attributes.insert(name.to_string(), value.to_string());
            }
        }
    }

    let (id, attempt) = match message.info() {
        Ok(info) => (
            info.stream_sequence.to_string(),
            u32::try_from(info.delivered).unwrap_or(1),
        ),
        Err(e) => {
            warn!(error = %e, "Message metadata unavailable");
            let id = attributes
                .get("Nats-Msg-Id")
                .cloned()
                .unwrap_or_default();
            (id, 1)
        }
    };

    let data = message.payload.to_vec();
    Message::new(id, data, NatsAcker { message })
        .with_attributes(attributes)
        .with_delivery_attempt(attempt)
}

/// Forwards acknowledgements to JetStream.
pub struct NatsAcker {
    message: jetstream::Message,
}

#[async_trait]
impl Acker for NatsAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.message
            .ack()
            .await
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }

    async fn nack(&self) -> Result<(), BrokerError> {
        self.message
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }
}
