mod error;
mod handlers;
mod models;
mod router;
mod state;

use ingestion::IngestionConfig;
use router::create_router;
use state::AppState;
use std::net::SocketAddr;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    tracing::info!("Starting reconciliation gateway");

    let mut config = IngestionConfig::default();
    if let Ok(base_url) = std::env::var("PANEL_BASE_URL") {
        config.base_url = base_url;
    }
    let state = AppState::new(config)?;

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
