//! Warden - account service entry point

use warden::{api, core, db};

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (handles CLI args, env vars, and config file)
    let config = match core::config::Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            // Logging isn't initialized yet
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let _logger = match core::Logger::init(&config.logging, config.environment) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return Err(e);
        }
    };

    info!(
        version = warden::VERSION,
        environment = config.environment.as_str(),
        "Starting Warden"
    );
    info!(
        host = %config.server.host,
        port = config.server.port,
        "Server configuration"
    );
    info!(url = %config.database.url, "Database configuration");
    info!(
        mode = ?config.shield.mode,
        window_seconds = config.shield.window_seconds,
        guest_limit = config.shield.guest_limit,
        user_limit = config.shield.user_limit,
        admin_limit = config.shield.admin_limit,
        "Security gate configuration"
    );

    info!("Initializing database...");
    let db = Arc::new(db::DatabaseManager::from_config(&config.database)?);
    info!("Database initialized successfully");

    let server_url = format!("http://{}:{}", config.server.host, config.server.port);
    let server = api::ApiServer::new(config, db)?;

    info!(url = %server_url, "Server ready - starting to serve requests");

    // Start serving (this will block until shutdown signal)
    server.serve().await?;

    Ok(())
}
