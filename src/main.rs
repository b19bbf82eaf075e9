use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use mongo_gateway::api::{server::start_api_server, state::ApiState};
use mongo_gateway::global::{
    config::{AppConfig, LogType, CONFIG_PATH_ENV},
    database::DocumentStore,
    housekeeping::{retention_window, rotate_log_files},
    logging::init_tracing,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first, logging depends on it
    let config = match AppConfig::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            eprintln!("Set {} to the configuration file path (default config.json)", CONFIG_PATH_ENV);
            return Err(e.into());
        }
    };

    let logging = &config.app.logging;
    let rotation = if logging.log_type == LogType::File {
        let retention = retention_window(logging.retention_days)?;
        Some(rotate_log_files(Path::new(&logging.log_file), retention, chrono::Utc::now())?)
    } else {
        None
    };

    // Held until exit so the file writer flushes
    let _log_guard = init_tracing(logging)?;

    info!("Starting mongo-gateway...");
    debug!(
        listen = %format!("{}:{}", config.app.host, config.app.port),
        log_type = ?config.app.logging.log_type,
        database_enabled = config.database.enabled,
        database_uri = %config.database.redacted_uri(),
        "Loaded configuration"
    );
    if let Some(report) = rotation {
        info!(
            removed = report.removed.len(),
            archived = ?report.archived,
            "Rotated log files"
        );
    }

    let mut state = ApiState::new(config.clone());
    if config.database.enabled {
        let store = DocumentStore::connect(&config.database).await.map_err(|e| {
            error!(error = %e, "Cannot start without MongoDB");
            e
        })?;
        state = state.with_store(Arc::new(store));
    } else {
        info!("MongoDB is disabled in config");
    }

    let store = state.store.clone();
    start_api_server(state, &config.app.host, config.app.port).await?;

    if let Some(store) = store {
        match Arc::try_unwrap(store) {
            Ok(store) => {
                if let Err(e) = store.close().await {
                    error!(error = %e, "Failed to close MongoDB connection");
                }
            }
            Err(_) => warn!("MongoDB connection still in use, leaving it to process exit"),
        }
    }

    info!("Shutdown complete");
    Ok(())
}
