//! Handler trait for delivered messages.

use crate::message::Message;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Message handler.
///
/// A handler owns the outcome of the message: every code path must end in
/// [`Message::ack`] or [`Message::nack`]. There is no return value; the
/// status left on the message is what middlewares observe.
///
/// `ctx` is the listener's cancellation token. Handlers doing long I/O may
/// select on `ctx.cancelled()`, but in-flight work is never aborted for them.
///
/// # Example
///
/// ```rust,ignore
/// struct Echo;
///
/// #[async_trait]
/// impl Handler for Echo {
///     async fn handle(&self, _ctx: &CancellationToken, msg: &mut Message) {
///         tracing::info!(len = msg.data().len(), "echo");
///         msg.ack().await;
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &CancellationToken, msg: &mut Message);
}

/// Shared, type-erased handler.
pub type BoxHandler = Arc<dyn Handler>;

struct FnHandler<F>(F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a CancellationToken, &'a mut Message) -> BoxFuture<'a, ()> + Send + Sync,
{
    async fn handle(&self, ctx: &CancellationToken, msg: &mut Message) {
        (self.0)(ctx, msg).await
    }
}

/// Turn a closure into a handler.
///
/// ```rust,ignore
/// use futures::FutureExt;
///
/// let handler = handler_fn(|_ctx, msg| async move { msg.ack().await }.boxed());
/// ```
pub fn handler_fn<F>(f: F) -> BoxHandler
where
    F: for<'a> Fn(&'a CancellationToken, &'a mut Message) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnHandler(f))
}
