//! Matchmaker: queue HTTP API plus the 1 Hz pairing loop

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use velocity_backend::config::MatchmakerConfig;
use velocity_backend::http::matchmaker::{build_router, MatchmakerState};
use velocity_backend::matchmaking::QueueManager;
use velocity_backend::util::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = MatchmakerConfig::from_env()?;
    init_tracing(&config.log_level);

    let queue = Arc::new(QueueManager::new(config.game_ws_addr.clone()));

    let cancel = CancellationToken::new();
    let loop_queue = queue.clone();
    let loop_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = loop_queue.run(Duration::from_secs(1), 2, loop_cancel).await {
            error!(error = %e, "queue loop failed");
        }
    });

    let router = build_router(MatchmakerState { queue });
    let listener = TcpListener::bind(config.addr).await?;

    info!(
        addr = %config.addr,
        game_server = %config.game_ws_addr,
        "matchmaker listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    info!("matchmaker shutdown complete");
    Ok(())
}
