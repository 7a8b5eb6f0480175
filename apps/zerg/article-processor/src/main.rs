//! Article Processor
//!
//! Binary entry point. See [`zerg_article_processor::run`].

#[tokio::main]
async fn main() -> eyre::Result<()> {
    zerg_article_processor::run().await
}
