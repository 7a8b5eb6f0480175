//! Event processing on top of message brokers.
//!
//! Subscriptions deliver messages, named events bind a subscription to a
//! handler, and middlewares wrap handlers with cross-cutting behaviour.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  subscription(id)   ┌──────────────────────────────────┐
//! │    Broker     │◀────────────────────│         ProcessorBuilder         │
//! │ (memory,nats) │                     │  handle(Event) / with_middleware │
//! └──────┬────────┘                     └────────────────┬─────────────────┘
//!        │ receive(ctx, handler)                         │ build(&broker)
//!        ▼                                               ▼
//! ┌───────────────┐    Message     ┌──────────┐ ┌─────────┐ ┌─────────┐
//! │ Subscription  │───────────────▶│  trace   │▶│ metrics │▶│ handler │
//! │  (throttle)   │◀── ack/nack ───└──────────┘ └─────────┘ └─────────┘
//! └───────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use messaging::{handler_fn, middleware, Event, ProcessorBuilder};
//!
//! let processor = ProcessorBuilder::new()
//!     .with_middlewares([middleware::trace(), middleware::metrics()])
//!     .handle(Event::new("AddArticle", "add-article-sub", add_article).throttle(1))
//!     .build(&broker)
//!     .await?;
//!
//! let running = processor.start(&ctx, errc);
//! // ...
//! running.stop().await?;
//! ```

pub mod broker;
mod error;
mod event;
mod handler;
pub mod memory;
mod message;
pub mod middleware;
#[cfg(feature = "nats")]
pub mod nats;
mod processor;
pub mod propagation;
mod status;

pub use broker::{Broker, Subscription};
pub use error::{BrokerError, ErrorCategory, ProcessorError};
pub use event::{Event, DEFAULT_THROTTLE};
pub use handler::{handler_fn, BoxHandler, Handler};
pub use message::{Acker, Message};
pub use middleware::{compose, middleware_fn, Middleware};
pub use processor::{Processor, ProcessorBuilder, RunningProcessor};
pub use status::Status;

// Handlers and middlewares receive this as their context
pub use tokio_util::sync::CancellationToken;
