use crate::models::{Article, ArticlePayload};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{NotSet, Set};

/// Sea-ORM Entity for the articles table
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Article {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            body: model.body,
        }
    }
}

// Id is assigned by the database
impl From<ArticlePayload> for ActiveModel {
    fn from(payload: ArticlePayload) -> Self {
        ActiveModel {
            id: NotSet,
            title: Set(payload.title),
            description: Set(payload.description),
            body: Set(payload.body),
        }
    }
}
