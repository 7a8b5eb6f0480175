use super::{middleware_fn, Middleware};
use crate::handler::{BoxHandler, Handler};
use crate::message::Message;
use async_trait::async_trait;
use observability::EventMetrics;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Count processed messages by final status and time the wrapped handler.
///
/// Emits `events_processed{event_name, status}` and
/// `events_duration{event_name}` (seconds).
pub fn metrics() -> Middleware {
    middleware_fn(|event, next| {
        Arc::new(MetricsHandler {
            event: event.to_string(),
            next,
        })
    })
}

struct MetricsHandler {
    event: String,
    next: BoxHandler,
}

#[async_trait]
impl Handler for MetricsHandler {
    async fn handle(&self, ctx: &CancellationToken, msg: &mut Message) {
        let start = Instant::now();

        self.next.handle(ctx, msg).await;

        EventMetrics::record_processed(&self.event, msg.status().as_str());
        EventMetrics::observe_duration(&self.event, start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::memory::NoopAcker;
    use crate::middleware::compose;
    use crate::status::Status;
    use futures::FutureExt;

    #[tokio::test]
    async fn test_metrics_does_not_alter_outcome() {
        let chain = compose(
            "AddArticle",
            handler_fn(|_ctx, msg| async move { msg.nack().await }.boxed()),
            &[metrics()],
        );

        let mut msg = Message::new("1", Vec::new(), NoopAcker);
        chain.handle(&CancellationToken::new(), &mut msg).await;

        assert_eq!(msg.status(), Status::Retry);
    }
}
