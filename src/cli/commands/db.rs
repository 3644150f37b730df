use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::{CliContext, OutputFormat};
use crate::config::{self, StoreBackend};
use crate::database::DatabaseManager;
use crate::jobs::ManualJobQueue;
use crate::services::SessionService;

/// Apply migrations; a memory backend has nothing to migrate
pub async fn migrate(output_format: OutputFormat) -> anyhow::Result<()> {
    let database = &config::config().database;
    if database.backend == StoreBackend::Memory {
        return output_success(&output_format, "Memory backend configured, nothing to migrate", None);
    }

    let pool = DatabaseManager::connect(database).await?;
    DatabaseManager::migrate(&pool).await?;
    output_success(&output_format, "Migrations applied", None)
}

/// One reconciliation pass over expired sessions
pub async fn sweep(ctx: &CliContext) -> anyhow::Result<()> {
    // Sweeping never enqueues, so a queue nobody drains is enough here
    let sessions = SessionService::new(ctx.store.clone(), std::sync::Arc::new(ManualJobQueue::new()));
    let finished = sessions.sweep_expired().await?;
    output_success(
        &ctx.output,
        &format!("Finished {} expired session(s)", finished),
        Some(json!({ "finished": finished })),
    )
}
