//! Handler middlewares.
//!
//! A middleware takes the event name and the next handler and returns a new
//! handler wrapping it:
//!
//! ```text
//!   [trace, metrics, audit]           (global ++ event specific)
//!
//!   trace ─▶ metrics ─▶ audit ─▶ handler
//!   trace ◀─ metrics ◀─ audit ◀─┘
//! ```
//!
//! The first middleware in the list is the outermost: it runs first and
//! returns last.

mod metrics;
mod trace;

pub use metrics::metrics;
pub use trace::trace;

use crate::handler::BoxHandler;
use std::sync::Arc;

/// Wraps a handler for one named event.
pub type Middleware = Arc<dyn Fn(&str, BoxHandler) -> BoxHandler + Send + Sync>;

/// Turn a closure into a middleware.
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(&str, BoxHandler) -> BoxHandler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap `handler` with `middlewares`, first element outermost.
pub fn compose(name: &str, handler: BoxHandler, middlewares: &[Middleware]) -> BoxHandler {
    middlewares
        .iter()
        .rev()
        .fold(handler, |next, middleware| middleware(name, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, Handler};
    use crate::memory::NoopAcker;
    use crate::message::Message;
    use crate::status::Status;
    use async_trait::async_trait;
    use futures::FutureExt;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Recording {
        label: &'static str,
        event: String,
        journal: Journal,
        next: BoxHandler,
    }

    #[async_trait]
    impl Handler for Recording {
        async fn handle(&self, ctx: &CancellationToken, msg: &mut Message) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:enter:{}", self.label, self.event));
            self.next.handle(ctx, msg).await;
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:exit:{}", self.label, msg.status()));
        }
    }

    fn recording(label: &'static str, journal: &Journal) -> Middleware {
        let journal = journal.clone();
        middleware_fn(move |event, next| {
            Arc::new(Recording {
                label,
                event: event.to_string(),
                journal: journal.clone(),
                next,
            })
        })
    }

    fn acking_handler(journal: &Journal) -> BoxHandler {
        let journal = journal.clone();
        handler_fn(move |_ctx, msg| {
            let journal = journal.clone();
            async move {
                journal.lock().unwrap().push("handler".to_string());
                msg.ack().await;
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_first_middleware_is_outermost() {
        let journal: Journal = Arc::default();
        let chain = compose(
            "AddArticle",
            acking_handler(&journal),
            &[recording("trace", &journal), recording("metrics", &journal)],
        );

        let mut msg = Message::new("1", Vec::new(), NoopAcker);
        chain.handle(&CancellationToken::new(), &mut msg).await;

        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                "trace:enter:AddArticle",
                "metrics:enter:AddArticle",
                "handler",
                "metrics:exit:ok",
                "trace:exit:ok",
            ]
        );
    }

    #[tokio::test]
    async fn test_middlewares_see_status_only_after_handler() {
        let journal: Journal = Arc::default();
        let nacking = handler_fn(|_ctx, msg| async move { msg.nack().await }.boxed());
        let chain = compose("AddArticle", nacking, &[recording("outer", &journal)]);

        let mut msg = Message::new("1", Vec::new(), NoopAcker);
        chain.handle(&CancellationToken::new(), &mut msg).await;

        assert_eq!(msg.status(), Status::Retry);
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["outer:enter:AddArticle", "outer:exit:retry"]
        );
    }

    #[tokio::test]
    async fn test_compose_without_middlewares_is_identity() {
        let journal: Journal = Arc::default();
        let chain = compose("AddArticle", acking_handler(&journal), &[]);

        let mut msg = Message::new("1", Vec::new(), NoopAcker);
        chain.handle(&CancellationToken::new(), &mut msg).await;

        assert_eq!(*journal.lock().unwrap(), vec!["handler"]);
        assert_eq!(msg.status(), Status::Ok);
    }
}
