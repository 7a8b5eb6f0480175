//! Message envelope handed to handlers.

use crate::error::BrokerError;
use crate::status::Status;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Broker-side acknowledgement primitives for one delivered message.
#[async_trait]
pub trait Acker: Send + Sync {
    /// Remove the message from the subscription backlog.
    async fn ack(&self) -> Result<(), BrokerError>;

    /// Make the message eligible for redelivery.
    async fn nack(&self) -> Result<(), BrokerError>;
}

/// A delivered message plus its processing status.
///
/// The handler decides the outcome by calling [`Message::ack`] or
/// [`Message::nack`], optionally after [`Message::set_status`].
pub struct Message {
    id: String,
    data: Vec<u8>,
    attributes: HashMap<String, String>,
    delivery_attempt: u32,
    status: Status,
    acker: Box<dyn Acker>,
}

impl Message {
    pub fn new(id: impl Into<String>, data: impl Into<Vec<u8>>, acker: impl Acker + 'static) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
            attributes: HashMap::new(),
            delivery_attempt: 1,
            status: Status::Unset,
            acker: Box::new(acker),
        }
    }

    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_delivery_attempt(mut self, attempt: u32) -> Self {
        self.delivery_attempt = attempt.max(1);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// 1 on first delivery, incremented by the broker on every redelivery.
    pub fn delivery_attempt(&self) -> u32 {
        self.delivery_attempt
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Override the status regardless of what it was.
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Acknowledge the message. Marks it `Ok` unless a status is already set.
    ///
    /// Repeated calls keep the status and still reach the broker.
    pub async fn ack(&mut self) {
        if self.status.is_unset() {
            self.status = Status::Ok;
        }
        if let Err(e) = self.acker.ack().await {
            warn!(message_id = %self.id, error = %e, "Failed to ack message");
        }
    }

    /// Negatively acknowledge the message. Marks it `Retry` unless a status is already set.
    pub async fn nack(&mut self) {
        if self.status.is_unset() {
            self.status = Status::Retry;
        }
        if let Err(e) = self.acker.nack().await {
            warn!(message_id = %self.id, error = %e, "Failed to nack message");
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("len", &self.data.len())
            .field("attributes", &self.attributes)
            .field("delivery_attempt", &self.delivery_attempt)
            .field("status", &self.status)
            .finish()
    }
}
