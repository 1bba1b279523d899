//! Gateway: guest auth and matchmaking proxy for browser clients

use tokio::net::TcpListener;
use tracing::info;

use velocity_backend::config::GatewayConfig;
use velocity_backend::http::gateway::{build_router, GatewayState};
use velocity_backend::util::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = GatewayConfig::from_env()?;
    init_tracing(&config.log_level);

    let state = GatewayState::new(&config)?;
    let router = build_router(state);
    let listener = TcpListener::bind(config.addr).await?;

    info!(
        addr = %config.addr,
        matchmaker = %config.matchmaker_http,
        "gateway listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gateway shutdown complete");
    Ok(())
}
