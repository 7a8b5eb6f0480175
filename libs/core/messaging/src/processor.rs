//! Event processor lifecycle.
//!
//! ```text
//!  ProcessorBuilder ──build(&broker)──▶ Processor ──start(ctx, errc)──▶ RunningProcessor ──stop()──▶ done
//!   handle(event)                       immutable                      one task per event
//!   with_middleware(mw)
//! ```
//!
//! Registration only exists on the builder. `build` composes every handler
//! chain once, resolves subscriptions and applies throttles, so a bad
//! subscription id fails before anything listens.

use crate::broker::{Broker, Subscription};
use crate::error::{BrokerError, ProcessorError};
use crate::event::Event;
use crate::handler::BoxHandler;
use crate::middleware::{compose, Middleware};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Collects events and global middlewares.
#[derive(Default)]
pub struct ProcessorBuilder {
    events: Vec<Event>,
    middlewares: Vec<Middleware>,
}

impl ProcessorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event.
    pub fn handle(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// Add a global middleware. Globals wrap event specific middlewares.
    pub fn with_middleware(mut self, middleware: Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn with_middlewares(mut self, middlewares: impl IntoIterator<Item = Middleware>) -> Self {
        self.middlewares.extend(middlewares);
        self
    }

    /// Resolve every event against `broker`.
    ///
    /// Fails with [`ProcessorError::InvalidThrottle`] or
    /// [`ProcessorError::UnknownSubscription`] on the first bad event.
    pub async fn build<B>(self, broker: &B) -> Result<Processor, ProcessorError>
    where
        B: Broker + ?Sized,
    {
        let mut listeners = Vec::with_capacity(self.events.len());

        for event in self.events {
            if event.throttle == 0 {
                return Err(ProcessorError::InvalidThrottle {
                    event: event.name,
                    throttle: event.throttle,
                });
            }

            let mut subscription = broker
                .subscription(&event.subscription_id)
                .await
                .map_err(|source| ProcessorError::UnknownSubscription {
                    event: event.name.clone(),
                    subscription_id: event.subscription_id.clone(),
                    source,
                })?;
            subscription.set_max_outstanding(event.throttle);

            let chain: Vec<Middleware> = self
                .middlewares
                .iter()
                .chain(event.middlewares.iter())
                .cloned()
                .collect();
            let handler = compose(&event.name, event.handler, &chain);

            debug!(
                event = %event.name,
                subscription = %subscription.id(),
                throttle = event.throttle,
                middlewares = chain.len(),
                "Event registered"
            );

            listeners.push(Listener {
                event: event.name,
                subscription,
                handler,
            });
        }

        Ok(Processor { listeners })
    }
}

struct Listener {
    event: String,
    subscription: Box<dyn Subscription>,
    handler: BoxHandler,
}

/// Built processor, ready to listen.
pub struct Processor {
    listeners: Vec<Listener>,
}

impl Processor {
    pub fn builder() -> ProcessorBuilder {
        ProcessorBuilder::new()
    }

    /// Registered event names in registration order.
    pub fn events(&self) -> Vec<&str> {
        self.listeners.iter().map(|l| l.event.as_str()).collect()
    }

    /// Spawn one listener task per event.
    ///
    /// Listeners stop when `ctx` is cancelled or [`RunningProcessor::stop`] is
    /// called. A listener whose subscription fails sends
    /// [`ProcessorError::Subscription`] to `errc` and exits; the others keep
    /// running.
    pub fn start(
        self,
        ctx: &CancellationToken,
        errc: mpsc::Sender<ProcessorError>,
    ) -> RunningProcessor {
        let token = ctx.child_token();

        info!(events = self.listeners.len(), "Event processor listening");

        let tasks = self
            .listeners
            .into_iter()
            .map(|listener| {
                let event = listener.event.clone();
                let handle = tokio::spawn(listen(listener, token.clone(), errc.clone()));
                (event, handle)
            })
            .collect();

        RunningProcessor { token, tasks }
    }

    /// Listen until `ctx` is cancelled or a subscription fails.
    ///
    /// The first failure cancels the remaining listeners and is returned.
    pub async fn run(self, ctx: &CancellationToken) -> Result<(), ProcessorError> {
        let (errc, mut errors) = mpsc::channel(self.listeners.len().max(1));
        let running = self.start(ctx, errc);

        // Closes once every listener dropped its sender
        let failure = errors.recv().await;
        let panicked = running.shutdown().await;

        match failure.or(panicked) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

async fn listen(listener: Listener, token: CancellationToken, errc: mpsc::Sender<ProcessorError>) {
    let Listener {
        event,
        subscription,
        handler,
    } = listener;

    debug!(
        event = %event,
        subscription = %subscription.id(),
        max_outstanding = subscription.max_outstanding(),
        "Listener started"
    );

    let result = match subscription.receive(token.clone(), handler).await {
        Ok(()) if token.is_cancelled() => Ok(()),
        // Intake ended without cancellation, nothing is consuming the event anymore
        Ok(()) => Err(BrokerError::SubscriptionClosed(subscription.id().to_string())),
        Err(source) => Err(source),
    };

    match result {
        Ok(()) => {
            debug!(event = %event, subscription = %subscription.id(), "Listener stopped");
        }
        Err(source) => {
            error!(
                event = %event,
                subscription = %subscription.id(),
                error = %source,
                "Subscription failed, listener stopped"
            );
            let err = ProcessorError::Subscription { event, source };
            if let Err(unsent) = errc.send(err).await {
                error!(error = %unsent.0, "Error channel closed, dropping listener error");
            }
        }
    }
}

/// Handle to listening processor.
pub struct RunningProcessor {
    token: CancellationToken,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl RunningProcessor {
    /// Stop intake and wait for every listener.
    ///
    /// In-flight handlers run to completion. Apply a deadline with
    /// `tokio::time::timeout` if needed.
    pub async fn stop(self) -> Result<(), ProcessorError> {
        info!("Stopping event processor");
        if let Some(err) = self.shutdown().await {
            error!(error = %err, "Listener ended abnormally");
        }
        info!("Event processor stopped");
        Ok(())
    }

    async fn shutdown(self) -> Option<ProcessorError> {
        self.token.cancel();

        let mut first = None;
        for (event, handle) in self.tasks {
            if let Err(e) = handle.await {
                let err = ProcessorError::Listener {
                    event,
                    details: e.to_string(),
                };
                first.get_or_insert(err);
            }
        }
        first
    }
}
