//! JetStream backend tests against a real NATS server.
#![cfg(feature = "nats")]

use futures::FutureExt;
use messaging::nats::{NatsBroker, NatsPublisher, ProvisionOptions};
use messaging::propagation::{TraceContext, TRACEPARENT};
use messaging::{handler_fn, CancellationToken, Event, ProcessorBuilder, ProcessorError, Status};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_utils::TestNats;
use tokio::sync::mpsc;

const SUB: &str = "add-article-sub";
const SUBJECT: &str = "add-article";

#[derive(Debug, Clone)]
struct Seen {
    data: Vec<u8>,
    attempt: u32,
    traceparent: Option<String>,
}

async fn setup(nats: &TestNats, stream: &str) -> NatsBroker {
    let broker = NatsBroker::new(nats.client(), nats.config(stream));
    let options = ProvisionOptions {
        ack_wait: Duration::from_secs(5),
        max_deliver: 3,
        backoff: Vec::new(),
    };
    broker.provision(SUB, SUBJECT, &options).await.unwrap();
    broker
}

#[tokio::test]
async fn test_published_event_reaches_handler() {
    let nats = TestNats::new().await;
    let broker = setup(&nats, "ARTICLES_DELIVERY").await;
    let publisher = NatsPublisher::from_broker(&broker);

    let (tx, mut rx) = mpsc::unbounded_channel::<(Seen, Status)>();
    let handler = handler_fn(move |_ctx, msg| {
        let tx = tx.clone();
        async move {
            let seen = Seen {
                data: msg.data().to_vec(),
                attempt: msg.delivery_attempt(),
                traceparent: msg.attribute(TRACEPARENT).map(str::to_string),
            };
            msg.ack().await;
            tx.send((seen, msg.status())).unwrap();
        }
        .boxed()
    });

    let processor = ProcessorBuilder::new()
        .handle(Event::new("AddArticle", SUB, handler).throttle(1))
        .build(&broker)
        .await
        .unwrap();

    let ctx = CancellationToken::new();
    let (errc, _errors) = mpsc::channel(1);
    let running = processor.start(&ctx, errc);

    let payload = json!({"title": "t", "description": "d", "body": "b"});
    let sequence = publisher.publish_json(SUBJECT, &payload).await.unwrap();
    assert!(sequence > 0);

    let (seen, status) = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .unwrap();

    assert_eq!(status, Status::Ok);
    assert_eq!(seen.attempt, 1);
    assert_eq!(serde_json::from_slice::<serde_json::Value>(&seen.data).unwrap(), payload);
    let traceparent = seen.traceparent.expect("traceparent header missing");
    assert!(TraceContext::parse(&traceparent).is_some());

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_nack_is_redelivered() {
    let nats = TestNats::new().await;
    let broker = setup(&nats, "ARTICLES_REDELIVERY").await;
    let publisher = NatsPublisher::from_broker(&broker);

    let attempts = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, mut done) = mpsc::unbounded_channel::<()>();
    let seen = attempts.clone();
    let handler = handler_fn(move |_ctx, msg| {
        let seen = seen.clone();
        let done_tx = done_tx.clone();
        async move {
            seen.lock().unwrap().push(msg.delivery_attempt());
            if msg.delivery_attempt() == 1 {
                msg.nack().await;
            } else {
                msg.ack().await;
                done_tx.send(()).unwrap();
            }
        }
        .boxed()
    });

    let processor = ProcessorBuilder::new()
        .handle(Event::new("AddArticle", SUB, handler))
        .build(&broker)
        .await
        .unwrap();

    let ctx = CancellationToken::new();
    let (errc, _errors) = mpsc::channel(1);
    let running = processor.start(&ctx, errc);

    publisher
        .publish_json(SUBJECT, &json!({"title": "retry"}))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(15), done.recv())
        .await
        .expect("message was not redelivered");
    assert_eq!(*attempts.lock().unwrap(), vec![1, 2]);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_consumer_fails_build() {
    let nats = TestNats::new().await;
    let broker = setup(&nats, "ARTICLES_UNKNOWN").await;

    let handler = handler_fn(|_ctx, msg| async move { msg.ack().await }.boxed());
    let err = ProcessorBuilder::new()
        .handle(Event::new("RemoveArticle", "remove-article-sub", handler))
        .build(&broker)
        .await
        .err()
        .unwrap();

    assert!(matches!(
        err,
        ProcessorError::UnknownSubscription { ref subscription_id, .. } if subscription_id == "remove-article-sub"
    ));
}
