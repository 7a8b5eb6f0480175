use super::handle_error;
use async_trait::async_trait;
use domain_articles::{ArticlePayload, ArticleRepository};
use messaging::{BoxHandler, CancellationToken, Handler, Message};
use std::sync::Arc;
use tracing::info;

/// Handler for `AddArticle` events.
///
/// | outcome            | status   | broker |
/// |--------------------|----------|--------|
/// | stored             | `Ok`     | ack    |
/// | malformed JSON     | `Failed` | ack    |
/// | validation failure | `Failed` | ack    |
/// | database failure   | `Retry`  | nack   |
pub struct AddArticle<R> {
    repository: R,
}

impl<R: ArticleRepository + 'static> AddArticle<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn boxed(self) -> BoxHandler {
        Arc::new(self)
    }
}

/// Shorthand for `AddArticle::new(repository).boxed()`.
pub fn add_article<R: ArticleRepository + 'static>(repository: R) -> BoxHandler {
    AddArticle::new(repository).boxed()
}

#[async_trait]
impl<R: ArticleRepository> Handler for AddArticle<R> {
    async fn handle(&self, _ctx: &CancellationToken, msg: &mut Message) {
        let payload = match ArticlePayload::decode(msg.data()) {
            Ok(payload) => payload,
            Err(err) => return handle_error(msg, &err, err.category()).await,
        };

        if let Err(err) = payload.check() {
            return handle_error(msg, &err, err.category()).await;
        }

        match self.repository.insert_article(payload).await {
            Ok(article) => {
                info!(article_id = article.id, title = %article.title, "Article added");
                msg.ack().await;
            }
            Err(err) => handle_error(msg, &err, err.category()).await,
        }
    }
}
