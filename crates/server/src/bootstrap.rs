use std::sync::Arc;

use quoteflow_core::collab::QueuedDraftGenerator;
use quoteflow_core::config::{AppConfig, ConfigError, LoadOptions};
use quoteflow_db::{
    connect_with_settings, migrations, ConversionService, DbPool, DraftService, LedgerService,
    QuoteService, VersioningService, WorkflowService,
};
use thiserror::Error;
use tracing::info;

use crate::crm::customer_directory;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub quotes: QuoteService,
    pub ledger: LedgerService,
    pub workflow: WorkflowService,
    pub versioning: VersioningService,
    pub conversion: ConversionService,
    pub drafts: DraftService,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let ledger = LedgerService::new(db_pool.clone(), config.engine.item_bounds());
    let application = Application {
        quotes: QuoteService::new(db_pool.clone()),
        workflow: WorkflowService::new(db_pool.clone(), config.engine.review_policy()),
        versioning: VersioningService::new(db_pool.clone()),
        conversion: ConversionService::new(db_pool.clone(), customer_directory(&config.crm)),
        drafts: DraftService::new(
            db_pool.clone(),
            Arc::new(QueuedDraftGenerator::default()),
            ledger.clone(),
        ),
        ledger,
        db_pool,
        config,
    };

    Ok(application)
}
