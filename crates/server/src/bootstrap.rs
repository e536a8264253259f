use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use maitred_agent::llm::HttpPlanner;
use maitred_agent::runtime::AgentRuntime;
use maitred_agent::tools::ToolExecutor;
use maitred_core::config::AppConfig;
use maitred_db::repositories::{SqlBookingRepository, SqlChatSessionRepository, SqlUserRepository};
use maitred_db::{connect, migrations, DbPool};
use maitred_gateway::{GatewayError, RestBookingProvider};

use crate::api::AppState;
use crate::sessions::SessionRegistry;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("booking provider client failed to build: {0}")]
    Provider(#[from] GatewayError),
    #[error("planner client failed to build: {0}")]
    Planner(#[source] anyhow::Error),
}

/// Wire config -> pool -> migrations -> gateway -> agent runtime -> routes.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let users = Arc::new(SqlUserRepository::new(db_pool.clone()));
    let bookings = Arc::new(SqlBookingRepository::new(db_pool.clone()));
    let chat_sessions = Arc::new(SqlChatSessionRepository::new(db_pool.clone()));

    let provider = Arc::new(RestBookingProvider::new(&config.provider)?);
    let planner = Arc::new(HttpPlanner::new(&config.planner).map_err(BootstrapError::Planner)?);

    let executor = ToolExecutor::new(
        provider,
        bookings,
        users.clone(),
        &config.provider.restaurant,
        config.agent.clone(),
    );
    let runtime =
        AgentRuntime::new(planner, executor, &config.provider.restaurant, config.agent.clone());

    let state = AppState::new(
        users,
        chat_sessions,
        Arc::new(runtime),
        SessionRegistry::new(),
        config.server.include_trace_in_responses,
    );

    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use maitred_core::config::AppConfig;

    use crate::bootstrap::bootstrap_with_config;

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_builds_the_runtime() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:?cache=shared".to_string();

        let app = bootstrap_with_config(config).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('users', 'bookings', 'chat_sessions')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected baseline tables to be available after bootstrap");
        assert_eq!(table_count, 3, "bootstrap should expose all baseline tables");

        app.db_pool.close().await;
    }
}
