//! Velocity Backend - authoritative rocket-soccer arena services
//!
//! This crate hosts four small services that together run one match:
//! - `gameserver`: the authoritative simulation world plus WebSocket replication
//! - `matchmaker`: in-memory ticket queue with MMR-window pairing and bot fill
//! - `gateway`: guest token issuance and matchmaking proxy
//! - `telemetry`: fire-and-forget event ring buffer with Prometheus text metrics

pub mod config;
pub mod http;
pub mod matchmaking;
pub mod sim;
pub mod types;
pub mod util;
pub mod ws;
