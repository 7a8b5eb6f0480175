//! NATS JetStream backend.
//!
//! ```text
//!  NatsPublisher ──subject-{env}──▶ stream (NATS_STREAM) ──▶ durable pull consumer {sub}-{env}
//!                                                                     │
//!                                                     NatsSubscription::receive
//!                                                                     │
//!                                                           composed handler chain
//! ```
//!
//! Subscriptions are durable pull consumers that already exist on the
//! configured stream. [`NatsBroker::provision`] creates them for local runs
//! and tests. Redelivery delay and attempt limits are consumer settings
//! (`ack_wait`, `backoff`, `max_deliver`), not processor settings.

mod broker;
mod publisher;

pub use broker::{NatsAcker, NatsBroker, NatsSubscription, ProvisionOptions};
pub use publisher::NatsPublisher;
