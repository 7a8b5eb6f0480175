use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::ArticleResult;
use crate::models::{Article, ArticlePayload};

/// Repository trait for Article persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Store a new article and return it with its assigned id
    async fn insert_article(&self, payload: ArticlePayload) -> ArticleResult<Article>;

    /// Get an article by ID
    async fn get_article(&self, id: i32) -> ArticleResult<Option<Article>>;
}

#[async_trait]
impl<T: ArticleRepository + ?Sized> ArticleRepository for Arc<T> {
    async fn insert_article(&self, payload: ArticlePayload) -> ArticleResult<Article> {
        (**self).insert_article(payload).await
    }

    async fn get_article(&self, id: i32) -> ArticleResult<Option<Article>> {
        (**self).get_article(id).await
    }
}

/// In-memory implementation of ArticleRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryArticleRepository {
    inner: Arc<RwLock<Store>>,
}

#[derive(Debug, Default)]
struct Store {
    articles: HashMap<i32, Article>,
    last_id: i32,
}

impl InMemoryArticleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.articles.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ArticleRepository for InMemoryArticleRepository {
    async fn insert_article(&self, payload: ArticlePayload) -> ArticleResult<Article> {
        let mut store = self.inner.write().await;
        store.last_id += 1;

        let article = Article::new(store.last_id, payload);
        store.articles.insert(article.id, article.clone());

        tracing::info!(article_id = article.id, "Inserted article");
        Ok(article)
    }

    async fn get_article(&self, id: i32) -> ArticleResult<Option<Article>> {
        Ok(self.inner.read().await.articles.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArticleError;

    #[tokio::test]
    async fn test_in_memory_assigns_sequential_ids() {
        let repo = InMemoryArticleRepository::new();
        assert!(repo.is_empty().await);

        let first = repo
            .insert_article(ArticlePayload::new("a", "b", "c"))
            .await
            .unwrap();
        let second = repo
            .insert_article(ArticlePayload::new("d", "e", "f"))
            .await
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(repo.len().await, 2);
        assert_eq!(repo.get_article(2).await.unwrap(), Some(second));
        assert_eq!(repo.get_article(3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_shared_repository_through_arc() {
        let repo: Arc<dyn ArticleRepository> = Arc::new(InMemoryArticleRepository::new());
        let article = repo
            .insert_article(ArticlePayload::new("t", "d", "b"))
            .await
            .unwrap();
        assert_eq!(repo.get_article(article.id).await.unwrap(), Some(article));
    }

    #[tokio::test]
    async fn test_mock_repository_failure() {
        let mut mock = MockArticleRepository::new();
        mock.expect_insert_article()
            .times(1)
            .returning(|_| Err(ArticleError::Database("connection reset".into())));

        let err = mock
            .insert_article(ArticlePayload::new("t", "d", "b"))
            .await
            .unwrap_err();
        assert!(err.category().should_retry());
    }
}
