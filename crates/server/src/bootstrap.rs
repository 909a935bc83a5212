use std::{sync::Arc, time::Duration};

use spinbot_core::config::{AppConfig, ConfigError, LoadOptions};
use spinbot_core::{CachedUserDirectory, Candidate, SelectionEngine};
use spinbot_db::{connect_with_settings, migrations, DbPool, SqlSelectionHistoryRepository};
use spinbot_slack::{
    api::{SlackApiError, SlackWebApi, SlackWebClient},
    directory::SlackDirectory,
    events::spinbot_dispatcher,
    mention::SpinMentionService,
    socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner},
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Arc<SelectionEngine>,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("slack client setup failed: {0}")]
    SlackClient(#[source] SlackApiError),
    #[error("could not resolve bot user id via auth.test: {0}")]
    BotIdentity(#[source] SlackApiError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        channel_id = "unknown",
        thread_id = "unknown",
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
        channel_id = "unknown",
        thread_id = "unknown",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        channel_id = "unknown",
        thread_id = "unknown",
        "database migrations applied"
    );

    let client = SlackWebClient::from_config(&config.slack).map_err(BootstrapError::SlackClient)?;
    let api: Arc<dyn SlackWebApi> = Arc::new(client);
    let bot_id = resolve_bot_id(&config, api.as_ref()).await?;
    info!(
        event_name = "system.bootstrap.bot_identity",
        correlation_id = "bootstrap",
        channel_id = "unknown",
        thread_id = "unknown",
        bot_user_id = %bot_id,
        "bot identity resolved"
    );

    let directory = CachedUserDirectory::new(
        SlackDirectory::new(api.clone()),
        Duration::from_secs(config.directory.cache_ttl_secs),
    );
    let history = SqlSelectionHistoryRepository::new(db_pool.clone());
    let engine = Arc::new(SelectionEngine::new(
        Arc::new(directory),
        Arc::new(history),
        config.selection.settings(bot_id),
    ));

    let dispatcher = spinbot_dispatcher(SpinMentionService::new(api.clone(), engine.clone()));
    let slack_runner = SocketModeRunner::new(
        Arc::new(NoopSocketTransport),
        dispatcher,
        ReconnectPolicy::default(),
    )
    .with_responder(api);

    Ok(Application { config, db_pool, engine, slack_runner })
}

/// Prefers the configured bot user id and only asks Slack when it is absent.
async fn resolve_bot_id(
    config: &AppConfig,
    api: &dyn SlackWebApi,
) -> Result<Candidate, BootstrapError> {
    if let Some(bot_user_id) = config.slack.bot_user_id.as_deref() {
        if !bot_user_id.is_empty() {
            return Ok(Candidate::from(bot_user_id));
        }
    }

    api.auth_test().await.map(Candidate::from).map_err(BootstrapError::BotIdentity)
}
