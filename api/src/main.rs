/// Reel Broker Server
///
/// Issues Vimeo tus upload sessions for the uploader. Holds the Vimeo
/// access token so clients never see it.
mod broker;
mod config;
mod routes;

use std::sync::Arc;
use tracing::{info, warn};

use broker::SessionBroker;
use config::{BrokerConfig, ServerConfig};

/// Shared application state for all API handlers.
pub struct AppState {
    pub broker: SessionBroker,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reel_api=info,tower_http=info".into()),
        )
        .init();

    // Config
    let broker_config = BrokerConfig::from_env();
    if broker_config.access_token.is_none() {
        warn!("VIMEO_ACCESS_TOKEN is not set; upload session requests will fail");
    }
    info!("Vimeo API base: {}", broker_config.api_base);
    let server_config = ServerConfig::from_env();

    // App state
    let state = Arc::new(AppState {
        broker: SessionBroker::new(broker_config),
    });

    let app = routes::router(state);

    // Bind
    let addr = server_config.addr();
    info!("Reel broker listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
