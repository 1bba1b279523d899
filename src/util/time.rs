//! Time utilities for the simulation and replication cadences

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as i64
}

/// Get current Unix timestamp in seconds
pub fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64
}

/// Get current Unix timestamp in nanoseconds
pub fn unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 120;
pub const SNAPSHOT_TPS: u32 = 60;

/// Fixed simulation step duration
pub const TICK_DURATION: Duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);
/// Replication broadcast period
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_micros(1_000_000 / SNAPSHOT_TPS as u64);

/// Delta time for physics (in seconds)
pub fn tick_delta() -> f64 {
    1.0 / SIMULATION_TPS as f64
}
