//! In-memory broker.
//!
//! Behaves like a pull subscription with explicit acks: at most
//! `max_outstanding` handlers run at once per subscription, nacked messages
//! are redelivered until `max_deliver` attempts are used up, and every
//! ack/nack reaching the broker is recorded for inspection.

use crate::broker::{Broker, Subscription};
use crate::error::BrokerError;
use crate::handler::BoxHandler;
use crate::message::{Acker, Message};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default number of delivery attempts before a nacked message is dropped.
pub const DEFAULT_MAX_DELIVER: u32 = 3;

/// Acknowledgement kind as seen by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    Ack,
    Nack,
}

/// One ack or nack call that reached the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckRecord {
    pub message_id: String,
    pub kind: AckKind,
}

/// Acker that accepts everything and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAcker;

#[async_trait]
impl Acker for NoopAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn nack(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Envelope {
    id: String,
    data: Vec<u8>,
    attributes: HashMap<String, String>,
    attempt: u32,
}

enum Delivery {
    Message(Envelope),
    Close,
}

struct Queue {
    id: String,
    max_deliver: u32,
    next_id: AtomicU64,
    tx: mpsc::UnboundedSender<Delivery>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>,
    acks: Mutex<Vec<AckRecord>>,
}

impl Queue {
    fn new(id: &str, max_deliver: u32) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id: id.to_string(),
            max_deliver: max_deliver.max(1),
            next_id: AtomicU64::new(1),
            tx,
            rx: tokio::sync::Mutex::new(rx),
            acks: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, message_id: &str, kind: AckKind) {
        if let Ok(mut acks) = self.acks.lock() {
            acks.push(AckRecord {
                message_id: message_id.to_string(),
                kind,
            });
        }
    }

    fn enqueue(&self, envelope: Envelope) -> Result<(), BrokerError> {
        self.tx
            .send(Delivery::Message(envelope))
            .map_err(|_| BrokerError::SubscriptionClosed(self.id.clone()))
    }
}

struct InMemoryAcker {
    queue: Arc<Queue>,
    envelope: Envelope,
    resolved: AtomicBool,
}

#[async_trait]
impl Acker for InMemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.queue.record(&self.envelope.id, AckKind::Ack);
        self.resolved.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn nack(&self) -> Result<(), BrokerError> {
        self.queue.record(&self.envelope.id, AckKind::Nack);
        // Only the first resolution of a delivery may schedule a redelivery
        if self.resolved.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.envelope.attempt >= self.queue.max_deliver {
            debug!(
                subscription = %self.queue.id,
                message_id = %self.envelope.id,
                attempts = self.envelope.attempt,
                "Max deliveries reached, dropping message"
            );
            return Ok(());
        }
        let mut redelivery = self.envelope.clone();
        redelivery.attempt += 1;
        self.queue.enqueue(redelivery)
    }
}

/// Broker keeping every subscription in process memory.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    queues: Arc<RwLock<HashMap<String, Arc<Queue>>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a subscription with [`DEFAULT_MAX_DELIVER`]. Existing ones are kept.
    pub async fn create_subscription(&self, id: &str) {
        self.create_subscription_with_max_deliver(id, DEFAULT_MAX_DELIVER)
            .await;
    }

    pub async fn create_subscription_with_max_deliver(&self, id: &str, max_deliver: u32) {
        let mut queues = self.queues.write().await;
        queues
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Queue::new(id, max_deliver)));
    }

    /// Publish a message straight into a subscription. Returns the message id.
    pub async fn publish(
        &self,
        id: &str,
        data: impl Into<Vec<u8>>,
        attributes: HashMap<String, String>,
    ) -> Result<String, BrokerError> {
        let queue = self.queue(id).await?;
        let message_id = queue.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        queue.enqueue(Envelope {
            id: message_id.clone(),
            data: data.into(),
            attributes,
            attempt: 1,
        })?;
        Ok(message_id)
    }

    /// Every ack and nack received for a subscription, in arrival order.
    pub async fn acks(&self, id: &str) -> Vec<AckRecord> {
        match self.queue(id).await {
            Ok(queue) => queue.acks.lock().map(|a| a.clone()).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Make listeners on this subscription fail as if it had been deleted.
    pub async fn close_subscription(&self, id: &str) -> Result<(), BrokerError> {
        let queue = self.queue(id).await?;
        queue
            .tx
            .send(Delivery::Close)
            .map_err(|_| BrokerError::SubscriptionClosed(id.to_string()))
    }

    async fn queue(&self, id: &str) -> Result<Arc<Queue>, BrokerError> {
        self.queues
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| BrokerError::not_found(id, "no such in-memory subscription"))
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn subscription(&self, id: &str) -> Result<Box<dyn Subscription>, BrokerError> {
        let queue = self.queue(id).await?;
        Ok(Box::new(InMemorySubscription {
            queue,
            max_outstanding: 1,
        }))
    }
}

struct InMemorySubscription {
    queue: Arc<Queue>,
    max_outstanding: usize,
}

impl InMemorySubscription {
    fn message(&self, envelope: Envelope) -> Message {
        Message::new(
            envelope.id.clone(),
            envelope.data.clone(),
            InMemoryAcker {
                queue: self.queue.clone(),
                envelope: envelope.clone(),
                resolved: AtomicBool::new(false),
            },
        )
        .with_attributes(envelope.attributes)
        .with_delivery_attempt(envelope.attempt)
    }
}

#[async_trait]
impl Subscription for InMemorySubscription {
    fn id(&self) -> &str {
        &self.queue.id
    }

    fn set_max_outstanding(&mut self, max: usize) {
        self.max_outstanding = max.max(1);
    }

    fn max_outstanding(&self) -> usize {
        self.max_outstanding
    }

    async fn receive(&self, ctx: CancellationToken, handler: BoxHandler) -> Result<(), BrokerError> {
        let mut rx = self.queue.rx.lock().await;
        let permits = Arc::new(Semaphore::new(self.max_outstanding));
        let mut in_flight = JoinSet::new();

        let result = loop {
            // Take a slot before pulling so a saturated subscription leaves
            // messages queued instead of holding them in memory here.
            let permit = tokio::select! {
                biased;
                _ = ctx.cancelled() => break Ok(()),
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break Ok(()),
                },
            };

            let delivery = tokio::select! {
                biased;
                _ = ctx.cancelled() => break Ok(()),
                delivery = rx.recv() => delivery,
            };

            match delivery {
                Some(Delivery::Message(envelope)) => {
                    let mut msg = self.message(envelope);
                    let handler = handler.clone();
                    let ctx = ctx.clone();
                    in_flight.spawn(async move {
                        let _permit = permit;
                        handler.handle(&ctx, &mut msg).await;
                    });
                }
                Some(Delivery::Close) | None => {
                    break Err(BrokerError::SubscriptionClosed(self.queue.id.clone()));
                }
            }

            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    warn!(subscription = %self.queue.id, error = %e, "Handler task failed");
                }
            }
        };

        // Cooperative stop: let in-flight handlers finish
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                warn!(subscription = %self.queue.id, error = %e, "Handler task failed");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use futures::FutureExt;
    use std::time::Duration;

    async fn listen(
        broker: &InMemoryBroker,
        id: &str,
        handler: BoxHandler,
    ) -> (CancellationToken, tokio::task::JoinHandle<Result<(), BrokerError>>) {
        let subscription = broker.subscription(id).await.unwrap();
        let ctx = CancellationToken::new();
        let child = ctx.clone();
        let task = tokio::spawn(async move { subscription.receive(child, handler).await });
        (ctx, task)
    }

    async fn wait_for_acks(broker: &InMemoryBroker, id: &str, count: usize) -> Vec<AckRecord> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let acks = broker.acks(id).await;
                if acks.len() >= count {
                    return acks;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for acks")
    }

    #[tokio::test]
    async fn test_unknown_subscription() {
        let broker = InMemoryBroker::new();
        let err = broker.subscription("missing").await.err().unwrap();
        assert!(matches!(err, BrokerError::SubscriptionNotFound { ref id, .. } if id == "missing"));

        let err = broker.publish("missing", b"{}".to_vec(), HashMap::new()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_acked_message_is_recorded() {
        let broker = InMemoryBroker::new();
        broker.create_subscription("sub").await;
        let id = broker.publish("sub", b"hello".to_vec(), HashMap::new()).await.unwrap();

        let (ctx, task) = listen(
            &broker,
            "sub",
            handler_fn(|_ctx, msg| async move { msg.ack().await }.boxed()),
        )
        .await;

        let acks = wait_for_acks(&broker, "sub", 1).await;
        assert_eq!(
            acks,
            vec![AckRecord {
                message_id: id,
                kind: AckKind::Ack
            }]
        );

        ctx.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_nack_redelivers_until_max_deliver() {
        let broker = InMemoryBroker::new();
        broker.create_subscription_with_max_deliver("sub", 2).await;
        broker.publish("sub", b"x".to_vec(), HashMap::new()).await.unwrap();

        let attempts = Arc::new(Mutex::new(Vec::new()));
        let seen = attempts.clone();
        let (ctx, task) = listen(
            &broker,
            "sub",
            handler_fn(move |_ctx, msg| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(msg.delivery_attempt());
                    msg.nack().await;
                }
                .boxed()
            }),
        )
        .await;

        let acks = wait_for_acks(&broker, "sub", 2).await;
        assert!(acks.iter().all(|a| a.kind == AckKind::Nack));

        // No third delivery
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*attempts.lock().unwrap(), vec![1, 2]);

        ctx.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_close_subscription_is_fatal() {
        let broker = InMemoryBroker::new();
        broker.create_subscription("sub").await;

        let (_ctx, task) = listen(
            &broker,
            "sub",
            handler_fn(|_ctx, msg| async move { msg.ack().await }.boxed()),
        )
        .await;
        broker.close_subscription("sub").await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(BrokerError::SubscriptionClosed(_))));
    }

    #[tokio::test]
    async fn test_attributes_reach_handler() {
        let broker = InMemoryBroker::new();
        broker.create_subscription("sub").await;
        let attributes = HashMap::from([("traceparent".to_string(), "abc".to_string())]);
        broker.publish("sub", Vec::new(), attributes).await.unwrap();

        let seen = Arc::new(Mutex::new(None));
        let probe = seen.clone();
        let (ctx, task) = listen(
            &broker,
            "sub",
            handler_fn(move |_ctx, msg| {
                let probe = probe.clone();
                async move {
                    *probe.lock().unwrap() = msg.attribute("traceparent").map(str::to_string);
                    msg.ack().await;
                }
                .boxed()
            }),
        )
        .await;

        wait_for_acks(&broker, "sub", 1).await;
        assert_eq!(seen.lock().unwrap().as_deref(), Some("abc"));

        ctx.cancel();
        task.await.unwrap().unwrap();
    }
}
