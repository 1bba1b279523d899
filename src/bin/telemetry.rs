//! Telemetry sink: event ingest ring plus Prometheus text metrics

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use velocity_backend::config::TelemetryConfig;
use velocity_backend::http::telemetry::{build_router, TelemetryState, TelemetryStore};
use velocity_backend::util::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = TelemetryConfig::from_env()?;
    init_tracing(&config.log_level);

    let state = TelemetryState {
        store: Arc::new(TelemetryStore::new()),
    };
    let router = build_router(state);
    let listener = TcpListener::bind(config.addr).await?;

    info!(addr = %config.addr, "telemetry listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("telemetry shutdown complete");
    Ok(())
}
