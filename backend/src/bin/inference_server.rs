//! Inference server
//!
//! Serves `/chat` and `/chat/conversation` for the fine-tuned counseling
//! model. Generation runs on the model server at `MODEL_ENDPOINT`.

use resilio_backend::config::InferenceConfig;
use resilio_backend::inference::server::{router, InferenceState};
use resilio_backend::inference::{CompletionsGenerator, TextGenerator};
use resilio_backend::middleware::shutdown_signal;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = InferenceConfig::from_env();
    info!("Configuration loaded: {:?}", config);

    let generator = CompletionsGenerator::new(
        &config.model_endpoint,
        &config.model_name,
        config.timeout,
    )?;
    if generator.is_ready().await {
        info!(model = %config.model_name, "Model server is ready");
    } else {
        warn!(
            endpoint = %config.model_endpoint,
            "Model server not reachable yet; chat requests will return 503 until it is"
        );
    }

    let app = router(Arc::new(InferenceState::new(Arc::new(generator))));

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    info!("🚀 Inference server running on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
