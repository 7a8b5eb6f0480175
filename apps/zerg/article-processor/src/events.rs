//! Event wiring

use crate::handlers::add_article;
use domain_articles::ArticleRepository;
use messaging::middleware::{metrics, trace};
use messaging::{Event, ProcessorBuilder};

pub const ADD_ARTICLE: &str = "AddArticle";
pub const ADD_ARTICLE_SUBSCRIPTION: &str = "add-article-sub";
/// Subject `AddArticle` events are published on
pub const ADD_ARTICLE_SUBJECT: &str = "add-article";

/// Every event this service consumes, wrapped in trace and metrics.
///
/// Trace is outermost so the metrics layer runs inside the event span.
pub fn processor<R>(repository: R) -> ProcessorBuilder
where
    R: ArticleRepository + 'static,
{
    ProcessorBuilder::new()
        .with_middlewares([trace(), metrics()])
        .handle(Event::new(ADD_ARTICLE, ADD_ARTICLE_SUBSCRIPTION, add_article(repository)).throttle(1))
}
