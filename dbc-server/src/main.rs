//! dbc-server - Database console backend server
//!
//! Administration REST API for connections, masking patterns and access
//! policies, plus access decision evaluation.

use std::sync::Arc;

use anyhow::Context;
use dbc_core::Database;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod actor;
mod config;
mod error;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("dbc_server=info".parse()?))
        .init();

    info!("dbc-server v{}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::load()?;
    info!("Config loaded from {:?}", config.config_path);

    let db = Database::open(&config.database_path)
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    info!("Database ready at {:?}", config.database_path);

    let bind = config.bind.clone();
    let state = AppState::new(config, db);

    let seeded = state.masking.seed_defaults()?;
    if !seeded.is_empty() {
        info!("Installed {} default masking patterns", seeded.len());
    }

    let app = routes::create_router(Arc::clone(&state));
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
