//! Per-connection session pumps and the match replication loops
//!
//! Each connection gets a bounded send queue. The replication broadcaster
//! serializes one state envelope per cadence and enqueues it non-blockingly;
//! a slow client loses the newest snapshot and recovers on the next one,
//! since every snapshot is self-contained.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::sim::World;
use crate::util::id::next_id;
use crate::util::time::{tick_delta, unix_millis, SNAPSHOT_INTERVAL, TICK_DURATION};
use crate::ws::protocol::{ClientEnvelope, ServerEnvelope};

/// Bounded per-client send queue depth.
const SEND_QUEUE_CAPACITY: usize = 64;
/// Connections idle past this are closed by the read pump.
const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
/// Keepalive ping cadence on the write pump.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);

struct ClientHandle {
    send: mpsc::Sender<String>,
}

/// Shared state for one match process: the world plus the connection
/// registry the replication loop broadcasts into.
pub struct GameServer {
    pub world: Arc<World>,
    clients: DashMap<String, ClientHandle>,
}

impl GameServer {
    pub fn new(world: Arc<World>) -> Self {
        Self {
            world,
            clients: DashMap::new(),
        }
    }

    /// Membership policy: a lone human gets a bot opponent, any other
    /// headcount clears all bots.
    pub fn maintain_bot_balance(&self, preferred_human: Option<&str>) {
        match self.world.human_count() {
            1 => {
                let human = preferred_human
                    .map(str::to_string)
                    .or_else(|| self.world.first_human_id());
                if let Some(id) = human {
                    self.world.ensure_bot_opponent(&id);
                }
            }
            _ => self.world.remove_all_bots(),
        }
    }
}

/// Query parameters for the WebSocket connection. Anonymous connections get
/// a generated guest id.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub player_id: Option<String>,
    pub display_name: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(server): State<Arc<GameServer>>,
) -> Response {
    let player_id = query
        .player_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| next_id("guest"));
    let display_name = query
        .display_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| player_id.clone());

    ws.on_upgrade(move |socket| handle_socket(socket, player_id, display_name, server))
}

async fn handle_socket(
    socket: WebSocket,
    player_id: String,
    display_name: String,
    server: Arc<GameServer>,
) {
    let team = server.world.ensure_player(&player_id, &display_name);
    server.maintain_bot_balance(Some(&player_id));

    let (send_tx, send_rx) = mpsc::channel::<String>(SEND_QUEUE_CAPACITY);
    server.clients.insert(
        player_id.clone(),
        ClientHandle {
            send: send_tx.clone(),
        },
    );
    info!(player_id = %player_id, team = %team, "client connected");

    enqueue(
        &send_tx,
        &ServerEnvelope::Welcome {
            state: Box::new(server.world.snapshot()),
            server_ms: unix_millis(),
            message: "connected".to_string(),
        },
    );

    let (ws_sink, ws_stream) = socket.split();
    let writer = tokio::spawn(write_pump(ws_sink, send_rx));
    read_pump(ws_stream, &player_id, &send_tx, &server).await;

    writer.abort();
    server.clients.remove(&player_id);
    server.world.remove_player(&player_id);
    server.maintain_bot_balance(None);
    info!(player_id = %player_id, "client disconnected");
}

/// Reader loop: decode envelopes, stamp the session's player id onto inputs
/// so clients cannot spoof each other, answer pings inline.
async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    player_id: &str,
    send_tx: &mpsc::Sender<String>,
    server: &Arc<GameServer>,
) {
    loop {
        let message = match timeout(READ_IDLE_TIMEOUT, stream.next()).await {
            Err(_) => {
                info!(player_id = %player_id, "closing idle connection");
                return;
            }
            Ok(None) => return,
            Ok(Some(Err(e))) => {
                debug!(player_id = %player_id, error = %e, "websocket read error");
                return;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => handle_envelope(text.as_str(), player_id, send_tx, server),
            Message::Close(_) => {
                info!(player_id = %player_id, "client initiated close");
                return;
            }
            Message::Binary(_) => {
                warn!(player_id = %player_id, "ignoring binary message");
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

fn handle_envelope(
    text: &str,
    player_id: &str,
    send_tx: &mpsc::Sender<String>,
    server: &Arc<GameServer>,
) {
    match serde_json::from_str::<ClientEnvelope>(text) {
        Err(_) => send_error(send_tx, "bad_payload"),
        Ok(ClientEnvelope::Input { input: None }) => send_error(send_tx, "missing_input"),
        Ok(ClientEnvelope::Input {
            input: Some(mut input),
        }) => {
            input.player_id = player_id.to_string();
            server.world.apply_input(*input);
        }
        Ok(ClientEnvelope::Ping) => enqueue(
            send_tx,
            &ServerEnvelope::Pong {
                server_ms: unix_millis(),
            },
        ),
        Ok(ClientEnvelope::Unknown) => send_error(send_tx, "unsupported_message_type"),
    }
}

/// Writer loop: drain the send queue and emit a keepalive ping when idle.
async fn write_pump(mut sink: SplitSink<WebSocket, Message>, mut send_rx: mpsc::Receiver<String>) {
    let mut keepalive = interval(KEEPALIVE_INTERVAL);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);
    keepalive.tick().await;

    loop {
        tokio::select! {
            queued = send_rx.recv() => match queued {
                Some(json) => {
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        return;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                }
            },
            _ = keepalive.tick() => {
                if sink.send(Message::Ping(Bytes::from_static(b"keepalive"))).await.is_err() {
                    return;
                }
            }
        }
    }
}

fn enqueue(send_tx: &mpsc::Sender<String>, envelope: &ServerEnvelope) {
    match serde_json::to_string(envelope) {
        Ok(json) => {
            let _ = send_tx.try_send(json);
        }
        Err(e) => error!(error = %e, "marshal envelope failed"),
    }
}

fn send_error(send_tx: &mpsc::Sender<String>, code: &str) {
    enqueue(
        send_tx,
        &ServerEnvelope::Error {
            message: code.to_string(),
        },
    );
}

/// Fixed-cadence simulation loop: 120 Hz with dt = 1/120, never frame-lagged.
pub async fn run_simulation_loop(server: Arc<GameServer>) {
    let mut ticker = interval(TICK_DURATION);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let dt = tick_delta();

    loop {
        ticker.tick().await;
        server.world.tick(dt);
    }
}

/// 60 Hz replication: snapshot once, serialize once, fan out non-blockingly.
pub async fn run_replication_loop(server: Arc<GameServer>) {
    let mut ticker = interval(SNAPSHOT_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let state = server.world.snapshot();
        let envelope = ServerEnvelope::State {
            tick: state.tick,
            state: Box::new(state),
            server_ms: unix_millis(),
            ack_seq: None,
        };
        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "marshal state failed");
                continue;
            }
        };

        for entry in server.clients.iter() {
            let _ = entry.value().send.try_send(payload.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> GameServer {
        GameServer::new(Arc::new(World::new(
            "balance",
            Duration::from_secs(10),
            &[],
        )))
    }

    #[test]
    fn lone_human_gets_a_bot_opponent() {
        let server = server();
        server.world.ensure_player("p1", "A");
        server.maintain_bot_balance(Some("p1"));

        let snap = server.world.snapshot();
        assert_eq!(snap.cars.len(), 2);
        assert!(snap.cars.values().any(|c| c.is_bot));
    }

    #[test]
    fn second_human_clears_bots() {
        let server = server();
        server.world.ensure_player("p1", "A");
        server.maintain_bot_balance(Some("p1"));
        server.world.ensure_player("p2", "B");
        server.maintain_bot_balance(Some("p2"));

        let snap = server.world.snapshot();
        assert!(snap.cars.values().all(|c| !c.is_bot));
        assert_eq!(snap.cars.len(), 2);
    }

    #[test]
    fn empty_match_clears_bots() {
        let server = server();
        server.world.ensure_player("p1", "A");
        server.maintain_bot_balance(Some("p1"));
        server.world.remove_player("p1");
        server.maintain_bot_balance(None);

        assert!(server.world.snapshot().cars.is_empty());
    }
}
