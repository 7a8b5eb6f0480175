//! Broker abstraction consumed by the processor.
//!
//! Backends:
//! - [`crate::memory::InMemoryBroker`] for tests and local runs
//! - `crate::nats::NatsBroker` (feature `nats`) for NATS JetStream

use crate::error::BrokerError;
use crate::handler::BoxHandler;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Resolves subscription ids to live subscriptions.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Look up a subscription.
    ///
    /// Returns [`BrokerError::SubscriptionNotFound`] when the id is unknown.
    async fn subscription(&self, id: &str) -> Result<Box<dyn Subscription>, BrokerError>;
}

/// A subscription the processor can listen on.
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Id as resolved by the broker (may include an environment suffix).
    fn id(&self) -> &str;

    /// Cap on concurrently unacknowledged messages.
    fn set_max_outstanding(&mut self, max: usize);

    fn max_outstanding(&self) -> usize;

    /// Deliver messages to `handler` until `ctx` is cancelled.
    ///
    /// Up to `max_outstanding` handler invocations may run concurrently.
    /// Returns `Ok(())` after cancellation once in-flight handlers finished,
    /// or an error when the subscription fails permanently. Recoverable
    /// delivery errors are logged and do not end the loop.
    async fn receive(&self, ctx: CancellationToken, handler: BoxHandler) -> Result<(), BrokerError>;
}
