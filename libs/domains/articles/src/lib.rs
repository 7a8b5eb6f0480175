//! Articles Domain
//!
//! Article model, payload validation and persistence used by the article
//! event handlers.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐
//! │ ArticlePayload │  ← decode + validate event bodies
//! └───────┬────────┘
//!         │
//! ┌───────▼────────┐
//! │   Repository   │  ← trait + in-memory / Postgres implementations
//! └───────┬────────┘
//!         │
//! ┌───────▼────────┐
//! │     Entity     │  ← sea-orm model of the articles table
//! └────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_articles::{ArticlePayload, ArticleRepository, PgArticleRepository};
//! use sea_orm::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("postgres://...").await?;
//! let repository = PgArticleRepository::new(db);
//!
//! let payload = ArticlePayload::decode(br#"{"title":"t","description":"d","body":"b"}"#)?;
//! payload.check()?;
//! let article = repository.insert_article(payload).await?;
//! # Ok(())
//! # }
//! ```

pub mod entity;
pub mod error;
pub mod models;
pub mod postgres;
pub mod repository;

// Re-export commonly used types
pub use error::{ArticleError, ArticleResult};
pub use models::{Article, ArticlePayload};
pub use postgres::PgArticleRepository;
pub use repository::{ArticleRepository, InMemoryArticleRepository};
