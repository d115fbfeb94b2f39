use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use clinichat_agent::{
    AgentRuntime, CompletionError, HttpCompletionClient, IntentRouter, QueryAuthorizer, QueryTool,
    ResponseComposer,
};
use clinichat_core::config::{AppConfig, ConfigError, LoadOptions};
use clinichat_core::InMemorySessionStore;
use clinichat_db::{connect_with_settings, migrations, DbPool, SqlConnector};

use crate::chat::ChatState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub chat: ChatState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("could not read system prompt file `{path}`: {source}")]
    SystemPrompt { path: PathBuf, source: std::io::Error },
    #[error("completion client setup failed: {0}")]
    Completion(#[from] CompletionError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    // Missing system prompt is a startup failure, never a per-turn one.
    let prompt_path = config.agent.system_prompt_path.clone();
    let system_prompt = tokio::fs::read_to_string(&prompt_path)
        .await
        .map_err(|source| BootstrapError::SystemPrompt { path: prompt_path, source })?;

    let completion: Arc<HttpCompletionClient> =
        Arc::new(HttpCompletionClient::from_config(&config.llm)?);

    let runtime = Arc::new(AgentRuntime::new(
        Arc::new(IntentRouter::new(completion.clone())),
        QueryAuthorizer::new(),
        QueryTool::new(
            Arc::new(SqlConnector::new(db_pool.clone())),
            Duration::from_secs(config.agent.query_timeout_secs),
        ),
        ResponseComposer::new(completion, Arc::from(system_prompt.as_str())),
        config.agent.max_iterations,
    ));

    let chat = ChatState::new(
        Arc::new(InMemorySessionStore::new()),
        runtime,
        turn_deadline(&config),
    );

    Ok(Application { config, db_pool, chat })
}

/// Whole-turn deadline: the worst-case sum of sub-call timeouts plus margin.
fn turn_deadline(config: &AppConfig) -> Duration {
    let iterations = u64::from(config.agent.max_iterations);
    let completion_budget = config.llm.timeout_secs * (iterations + 1);
    let query_budget = config.agent.query_timeout_secs * iterations;
    Duration::from_secs(completion_budget + query_budget + config.agent.turn_deadline_margin_secs)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clinichat_core::config::{ConfigOverrides, LoadOptions};

    use super::{bootstrap, turn_deadline, BootstrapError};

    fn options_with(system_prompt_path: Option<std::path::PathBuf>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                system_prompt_path,
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_system_prompt_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let missing = dir.path().join("missing_prompt.txt");

        let result = bootstrap(options_with(Some(missing))).await;

        assert!(matches!(result, Err(BootstrapError::SystemPrompt { .. })));
    }

    #[tokio::test]
    async fn bootstrap_succeeds_with_prompt_file_and_memory_database() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("system_prompt.txt");
        let mut file = std::fs::File::create(&path).expect("prompt file");
        writeln!(file, "אתה אסי, העוזר של אסותא.").expect("write prompt");

        let app = bootstrap(options_with(Some(path)))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'appointments'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query should succeed");
        assert_eq!(count, 1, "bootstrap should expose the appointments table");

        app.db_pool.close().await;
    }

    #[test]
    fn turn_deadline_covers_all_sub_call_timeouts() {
        let config = clinichat_core::config::AppConfig::default();
        let deadline = turn_deadline(&config);

        // 30s completion * 4 + 60s query * 3 + 5s margin with defaults.
        assert_eq!(deadline.as_secs(), 30 * 4 + 60 * 3 + 5);
    }
}
