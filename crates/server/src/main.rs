mod api;
mod bootstrap;
mod crm;
mod health;

use std::time::Duration;

use anyhow::Result;
use quoteflow_core::config::{AppConfig, LoadOptions};
use tower_http::trace::TraceLayer;

fn init_logging(config: &AppConfig) {
    use quoteflow_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let router = api::router(api::ApiState::from(&app))
        .merge(health::router(app.db_pool.clone()))
        .layer(TraceLayer::new_for_http());

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "quoteflow-server listening"
    );

    let shutdown_grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_grace))
        .await?;

    tracing::info!(event_name = "system.server.stopped", "quoteflow-server stopped");
    Ok(())
}

async fn wait_for_shutdown(grace: Duration) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    tracing::info!(
        event_name = "system.server.stopping",
        grace_secs = grace.as_secs(),
        "shutdown signal received"
    );
}
