//! Authoritative game server
//!
//! Owns one match: the 120 Hz simulation loop, the 60 Hz replication
//! broadcast, and the WebSocket sessions feeding inputs into the world.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use velocity_backend::config::GameConfig;
use velocity_backend::http::game::build_router;
use velocity_backend::sim::World;
use velocity_backend::util::{init_tracing, shutdown_signal};
use velocity_backend::ws::handler::{run_replication_loop, run_simulation_loop, GameServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = GameConfig::from_env()?;
    init_tracing(&config.log_level);

    let world = Arc::new(World::new(
        config.match_id.clone(),
        config.match_duration,
        &[],
    ));
    let server = Arc::new(GameServer::new(world));

    tokio::spawn(run_simulation_loop(server.clone()));
    tokio::spawn(run_replication_loop(server.clone()));

    let router = build_router(server);
    let listener = TcpListener::bind(config.addr).await?;

    info!(
        addr = %config.addr,
        match_id = %config.match_id,
        "authoritative game server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("game server shutdown complete");
    Ok(())
}
