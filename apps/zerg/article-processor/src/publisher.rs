//! Publishing side of `AddArticle`

use crate::events::ADD_ARTICLE_SUBJECT;
use domain_articles::ArticlePayload;
use eyre::{Result, WrapErr};
use messaging::nats::NatsPublisher;
use tracing::info;

/// Publishes validated `AddArticle` events.
#[derive(Clone)]
pub struct ArticlePublisher {
    inner: NatsPublisher,
}

impl ArticlePublisher {
    pub fn new(inner: NatsPublisher) -> Self {
        Self { inner }
    }

    /// Validate `payload` and publish it. Returns the stream sequence.
    ///
    /// Invalid payloads are rejected here instead of being dropped by the consumer.
    pub async fn publish_add_article(&self, payload: &ArticlePayload) -> Result<u64> {
        payload.check().wrap_err("Invalid article payload")?;

        let sequence = self
            .inner
            .publish_json(ADD_ARTICLE_SUBJECT, payload)
            .await
            .wrap_err("Failed to publish AddArticle event")?;

        info!(sequence, title = %payload.title, "AddArticle event published");
        Ok(sequence)
    }
}
