//! Resilio Backend
//!
//! REST API for accounts, sessions and chat history. Replies are produced by
//! the inference server configured through `INFERENCE_URL`.

use resilio_backend::config::{mask_url_password, Config};
use resilio_backend::db::Database;
use resilio_backend::middleware::shutdown_signal;
use resilio_backend::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config);

    let db = Database::connect(&config.database.url).await?;
    info!(
        url = %mask_url_password(&config.database.url),
        engine = ?db.engine(),
        "Database ready"
    );

    let app_state = AppState::from_config(&db, &config)?;
    match app_state.auth.purge_expired_sessions().await {
        Ok(0) => {}
        Ok(count) => info!("Purged {} expired sessions", count),
        Err(e) => warn!("Failed to purge expired sessions: {}", e),
    }

    let app = resilio_backend::build_router(Arc::new(app_state), &config.server.cors_origin)?;

    // Bind to address from config
    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    info!("🚀 Server running on http://{}", addr);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Inference server: {}", config.inference.base_url);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // Setup graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
