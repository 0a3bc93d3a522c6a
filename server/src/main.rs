mod config;
mod frame;
mod routes;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    if let Err(e) = dotenv {
        tracing::debug!(error = %e, "no .env loaded");
    }

    let config = config::ServerConfig::from_env()?;
    let addr = config.socket_addr();
    tracing::info!(
        client_channel_capacity = config.client_channel_capacity,
        max_snapshot_bytes = config.max_snapshot_bytes,
        chat_history_limit = config.chat_history_limit,
        "relay configured"
    );

    let state = state::AppState::new(config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "relay listening");
    axum::serve(listener, app).await?;
    Ok(())
}
