//! Interactive Segmentation Inference Server
//!
//! Serves the segmentation core and the stroke and click controllers over
//! REST, with OpenVINO acceleration.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use interact_server::config::Config;
use interact_server::engine::Runtime;
use interact_server::service::InteractService;
use interact_server::api::rest::{AppState, create_rest_router};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Starting Interactive Segmentation Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load(&Config::default_path()).unwrap_or_else(|e| {
        info!("Using default config ({})", e);
        Config::default()
    });

    info!("Configuration loaded:");
    info!("  Port: {}", config.server.port);
    info!("  Body limit: {} MB", config.server.body_limit_mb);
    info!("  Device: {}", config.inference.device);
    info!("  Network checkpoint: {}", config.checkpoints.network.display());
    match &config.checkpoints.s2m {
        Some(path) => info!("  S2M checkpoint: {}", path.display()),
        None => info!("  S2M checkpoint: none"),
    }
    info!("  FBRS checkpoint: {}", config.checkpoints.fbrs.display());

    // Networks are compiled lazily, on each handle's __init__
    let runtime = Arc::new(Runtime::new(&config.inference.device)?);

    let service = Arc::new(InteractService::new(&config.checkpoints, runtime)?);

    let app_state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
    });

    let router = create_rest_router(app_state, config.server.body_limit_mb);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("REST API listening on http://{}", addr);
    info!("Interactive Segmentation Server is ready!");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received, cleaning up...");
        })
        .await?;

    info!("Goodbye!");
    Ok(())
}
