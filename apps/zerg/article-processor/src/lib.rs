//! Article Processor
//!
//! Consumes `AddArticle` events from NATS JetStream and stores the articles
//! in PostgreSQL.
//!
//! ## Architecture
//!
//! ```text
//! NATS JetStream (ARTICLES stream)
//!   ↓ (durable pull consumer: add-article-sub-{env})
//! Processor (one listener per event, throttle 1)
//!   ↓ trace → metrics → AddArticle handler
//! PgArticleRepository (sea-orm)
//!   ↓
//! articles table
//! ```
//!
//! Handler outcomes: stored → ack, bad payload → `Failed` + ack,
//! database failure → `Retry` + nack (redelivered with consumer backoff).
//!
//! `/health`, `/ready` and `/metrics` are served on `HOST:PORT`.

pub mod config;
pub mod db;
pub mod events;
pub mod handlers;
pub mod publisher;

use clap::{Parser, Subcommand};
use config::Config;
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv, NatsConfig};
use domain_articles::{ArticlePayload, PgArticleRepository};
use eyre::{Result, WrapErr};
use messaging::{CancellationToken, ProcessorError};
use messaging::nats::{NatsBroker, NatsPublisher, ProvisionOptions};
use observability::{HealthServer, HealthState};
use publisher::ArticlePublisher;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// How long in-flight handlers get to finish on shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "article-processor")]
#[command(about = "Consume AddArticle events and store articles")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the event processor (default)
    Serve,

    /// Publish an AddArticle event
    Publish {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        #[arg(long)]
        body: String,
    },
}

/// Parse the command line and run the selected command.
///
/// # Errors
///
/// Returns an error if configuration is invalid, a backing service is
/// unreachable at startup, or a listener fails fatally while serving.
pub async fn run() -> Result<()> {
    install_color_eyre();

    let cli = Cli::parse();
    let environment = Environment::from_env();
    init_tracing(&environment);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = Config::from_env().wrap_err("Failed to load configuration")?;
            serve(config).await
        }
        Commands::Publish {
            title,
            description,
            body,
        } => {
            let config = config::publisher_config().wrap_err("Failed to load NATS configuration")?;
            publish(&config, ArticlePayload::new(title, description, body)).await
        }
    }
}

/// Run the processor until SIGINT/SIGTERM or a fatal listener error.
pub async fn serve(config: Config) -> Result<()> {
    info!(
        service = %config.service_name,
        environment = ?config.environment,
        "Starting article processor"
    );

    let metrics_handle = observability::init_metrics().wrap_err("Failed to install Prometheus recorder")?;

    let db = db::connect(&config.database)
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;
    db::run_migrations(&db)
        .await
        .wrap_err("Failed to run database migrations")?;
    db::check_health(&db)
        .await
        .wrap_err("PostgreSQL health check failed")?;

    let broker = NatsBroker::connect(&config.nats)
        .await
        .wrap_err_with(|| format!("Failed to connect to NATS at {}", config.nats.url))?;

    if config.provision {
        broker
            .provision(
                events::ADD_ARTICLE_SUBSCRIPTION,
                events::ADD_ARTICLE_SUBJECT,
                &ProvisionOptions::default(),
            )
            .await
            .wrap_err("Failed to provision JetStream stream and consumer")?;
    }

    let processor = events::processor(PgArticleRepository::new(db.clone()))
        .build(&broker)
        .await
        .wrap_err("Failed to build event processor")?;

    let ctx = CancellationToken::new();

    let health = HealthServer::new(config.server.address()).with_metrics(metrics_handle.clone());
    let health_state = health.state();
    health_state.set_broker_connected(true).await;
    health_state.set_processor_healthy(true).await;

    let health_task = tokio::spawn(health.run(ctx.clone().cancelled_owned()));

    let (errc, mut errors) = mpsc::channel(processor.events().len().max(1));
    let running = processor.start(&ctx, errc);

    let outcome = tokio::select! {
        result = shutdown_signal() => result,
        Some(err) = errors.recv() => {
            error!(event = %err.event(), error = %err, "Event processor failed");
            record_failure(&health_state, &err).await;
            Err(eyre::Report::new(err))
        }
    };

    info!("Stopping event processor...");
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, running.stop()).await {
        Ok(result) => result.wrap_err("Event processor failed to stop")?,
        Err(_) => warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Event processor did not stop in time"
        ),
    }

    ctx.cancel();
    match health_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Health server failed"),
        Err(e) => warn!(error = %e, "Health server task failed"),
    }

    if let Err(e) = db.close().await {
        warn!(error = %e, "Failed to close database pool");
    }

    info!("Article processor stopped");
    outcome
}

/// Mark the service unhealthy after a fatal listener error.
///
/// A failed subscription also means the broker side is gone.
async fn record_failure(state: &HealthState, err: &ProcessorError) {
    if matches!(err, ProcessorError::Subscription { .. }) {
        state.set_broker_connected(false).await;
    }
    state.set_processor_healthy(false).await;
    state.set_error(Some(err.to_string())).await;
}

/// Publish one `AddArticle` event.
pub async fn publish(config: &NatsConfig, payload: ArticlePayload) -> Result<()> {
    let broker = NatsBroker::connect(config)
        .await
        .wrap_err_with(|| format!("Failed to connect to NATS at {}", config.url))?;

    let publisher = ArticlePublisher::new(NatsPublisher::from_broker(&broker));
    let sequence = publisher.publish_add_article(&payload).await?;

    info!(sequence, stream = %config.stream, "Published");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .wrap_err("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.wrap_err("Failed to install Ctrl+C handler")?;
                info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .wrap_err("Failed to install Ctrl+C handler")?;
        info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}
