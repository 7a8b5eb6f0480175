use super::{middleware_fn, Middleware};
use crate::handler::{BoxHandler, Handler};
use crate::message::Message;
use crate::propagation::TraceContext;
use crate::status::Status;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, field, info_span, warn, Instrument};

/// Run each message inside an `event` span linked to the publisher's trace.
///
/// The span carries `event`, `message_id`, `delivery_attempt`, `trace_id`,
/// `span_id`, `parent_span_id` (when the message had a `traceparent`) and,
/// once the handler returned, `status`. Handlers may fill `error` through
/// `Span::current()`.
pub fn trace() -> Middleware {
    middleware_fn(|event, next| {
        Arc::new(TraceHandler {
            event: event.to_string(),
            next,
        })
    })
}

struct TraceHandler {
    event: String,
    next: BoxHandler,
}

#[async_trait]
impl Handler for TraceHandler {
    async fn handle(&self, ctx: &CancellationToken, msg: &mut Message) {
        let parent = TraceContext::extract(msg.attributes());
        let current = parent
            .as_ref()
            .map(TraceContext::child)
            .unwrap_or_else(TraceContext::new_root);

        let span = info_span!(
            "event",
            event = %self.event,
            message_id = %msg.id(),
            delivery_attempt = msg.delivery_attempt(),
            trace_id = %current.trace_id,
            span_id = %current.span_id,
            parent_span_id = field::Empty,
            status = field::Empty,
            error = field::Empty,
        );
        if let Some(parent) = &parent {
            span.record("parent_span_id", parent.span_id.as_str());
        }

        self.next.handle(ctx, msg).instrument(span.clone()).await;

        let status = msg.status();
        span.record("status", status.as_str());
        span.in_scope(|| match status {
            Status::Ok => debug!("Event handled"),
            Status::Failed | Status::Retry => warn!(status = %status, "Event handling failed"),
            Status::Unset => warn!("Handler returned without ack or nack"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::memory::NoopAcker;
    use crate::middleware::{compose, metrics, Middleware};
    use crate::propagation::TRACEPARENT;
    use futures::FutureExt;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;

    #[tokio::test]
    async fn test_trace_passes_status_through() {
        let chain = compose(
            "AddArticle",
            handler_fn(|_ctx, msg| {
                async move {
                    msg.set_status(Status::Failed);
                    msg.ack().await;
                }
                .boxed()
            }),
            &[trace()],
        );

        let attributes = HashMap::from([(
            TRACEPARENT.to_string(),
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01".to_string(),
        )]);
        let mut msg = Message::new("1", Vec::new(), NoopAcker).with_attributes(attributes);
        chain.handle(&CancellationToken::new(), &mut msg).await;

        assert_eq!(msg.status(), Status::Failed);
    }

    /// Remembers the span that was current when the metrics layer recorded a duration.
    #[derive(Clone, Default)]
    struct DurationSpans(Arc<Mutex<Vec<Option<String>>>>);

    impl<S> Layer<S> for DurationSpans
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
            if event.metadata().target() != "observability::events" {
                return;
            }
            let span = ctx.event_span(event).map(|span| span.name().to_string());
            self.0.lock().unwrap().push(span);
        }
    }

    async fn duration_spans(middlewares: &[Middleware]) -> Vec<Option<String>> {
        let spans = DurationSpans::default();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(spans.clone()));

        let handler = handler_fn(|_ctx, msg| async move { msg.ack().await }.boxed());
        let chain = compose("AddArticle", handler, middlewares);
        let mut msg = Message::new("1", Vec::new(), NoopAcker);
        chain.handle(&CancellationToken::new(), &mut msg).await;

        let seen = spans.0.lock().unwrap().clone();
        seen
    }

    #[tokio::test]
    async fn test_duration_is_measured_inside_event_span() {
        let seen = duration_spans(&[trace(), metrics()]).await;
        assert_eq!(seen, vec![Some("event".to_string())]);
    }

    #[tokio::test]
    async fn test_metrics_outside_trace_has_no_event_span() {
        let seen = duration_spans(&[metrics(), trace()]).await;
        assert_eq!(seen, vec![None]);
    }
}
