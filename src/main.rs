use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use learnhub_api::config;
use learnhub_api::database::DatabaseManager;
use learnhub_api::jobs::{spawn_sweeper, spawn_workers, JobHandler, TokioJobQueue};
use learnhub_api::routes::app;
use learnhub_api::services::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config().clone();
    tracing::info!("Starting learnhub-api in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let store = DatabaseManager::open_store(&config.database)
        .await
        .context("failed to open store")?;

    let (queue, receiver) = TokioJobQueue::channel(config.jobs.queue_capacity);
    let queue = Arc::new(queue);
    let workers = spawn_workers(
        config.jobs.workers,
        receiver,
        JobHandler::new(store.clone(), queue.clone()),
    );
    tracing::info!("Started {} job worker(s)", workers.len());

    let state = AppState::new(store, queue, config.clone());
    spawn_sweeper(
        state.sessions(),
        Duration::from_secs(config.jobs.sweep_interval_secs.max(1)),
    );

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("learnhub-api listening on http://{}", bind_addr);
    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}
