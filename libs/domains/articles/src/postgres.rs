use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait};

use crate::{
    entity,
    error::ArticleResult,
    models::{Article, ArticlePayload},
    repository::ArticleRepository,
};

#[derive(Clone)]
pub struct PgArticleRepository {
    db: DatabaseConnection,
}

impl PgArticleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ArticleRepository for PgArticleRepository {
    async fn insert_article(&self, payload: ArticlePayload) -> ArticleResult<Article> {
        let active_model: entity::ActiveModel = payload.into();
        let model = active_model.insert(&self.db).await?;

        tracing::info!(article_id = model.id, "Inserted article");
        Ok(model.into())
    }

    async fn get_article(&self, id: i32) -> ArticleResult<Option<Article>> {
        let model = entity::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }
}
