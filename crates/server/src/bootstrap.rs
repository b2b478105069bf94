use std::sync::Arc;

use orderly_agent::{capabilities, HttpLlmClient, LlmClient};
use orderly_core::audit::TracingAuditSink;
use orderly_core::config::{AppConfig, ConfigError, LoadOptions};
use orderly_core::pipeline::{OrderPipeline, PipelineContext, RenderError};
use orderly_db::{connect_with_config, migrations, DbPool, SqlCatalogRepository};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub context: Arc<PipelineContext>,
    pub pipeline: Arc<OrderPipeline>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client could not be built: {0}")]
    LlmClient(String),
    #[error("renderer could not be built: {0}")]
    Renderer(#[from] RenderError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let client = HttpLlmClient::from_config(&config.llm)
        .map_err(|error| BootstrapError::LlmClient(format!("{error:#}")))?;
    info!(
        event_name = "system.bootstrap.llm_configured",
        correlation_id = "bootstrap",
        provider = ?client.provider(),
        model = %client.model(),
        renderer = ?config.llm.renderer,
        "llm client configured"
    );
    bootstrap_with_client(config, Arc::new(client)).await
}

/// Builds the application around an already constructed completion client.
pub async fn bootstrap_with_client(
    config: AppConfig,
    client: Arc<dyn LlmClient>,
) -> Result<Application, BootstrapError> {
    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    let capabilities = capabilities(&config.llm, client)?;
    let context = Arc::new(PipelineContext::with_max_suggestions(
        Arc::new(SqlCatalogRepository::new(db_pool.clone())),
        capabilities.extractor,
        capabilities.renderer,
        Arc::new(TracingAuditSink),
        config.validation.max_suggestions,
    ));
    let pipeline = Arc::new(OrderPipeline::new(context.clone()));
    info!(
        event_name = "system.bootstrap.pipeline_ready",
        correlation_id = "bootstrap",
        "order pipeline initialized"
    );

    Ok(Application { config, db_pool, context, pipeline })
}
