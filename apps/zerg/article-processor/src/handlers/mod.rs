//! Event handlers

mod add_article;
mod handle_error;

pub use add_article::{AddArticle, add_article};
pub use handle_error::handle_error;
