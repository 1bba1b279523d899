//! Shared value model replicated between services and clients

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Position or direction in world space. Units are unreal-units (uu).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Orientation in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotator {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// Team identifier. Orange defends the -X goal and attacks +X.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    #[default]
    Orange,
    Blue,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::Orange => Team::Blue,
            Team::Blue => Team::Orange,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Team::Orange => "orange",
            Team::Blue => "blue",
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tick player control input. All fields default to neutral so partial
/// payloads decode cleanly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarInput {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub sequence: u64,
    /// -1..1
    #[serde(default)]
    pub throttle: f64,
    /// -1..1
    #[serde(default)]
    pub steer: f64,
    #[serde(default)]
    pub boost: bool,
    #[serde(default)]
    pub jump: bool,
    #[serde(default)]
    pub handbrake: bool,
    #[serde(default)]
    pub client_ms: i64,
}

/// Authoritative replicated state for a single car.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarState {
    pub player_id: String,
    pub display_name: String,
    pub team: Team,
    pub is_bot: bool,
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Rotator,
    pub boost: f64,
    pub is_grounded: bool,
    pub last_input: CarInput,
}

/// Authoritative state for the ball.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BallState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f64,
}

/// Goals and match timer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreState {
    pub orange: i32,
    pub blue: i32,
    pub time_remaining_ms: i32,
}

/// Full match state replicated to all clients. `events` holds only the
/// events accumulated during the most recent tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchState {
    pub match_id: String,
    pub tick: u64,
    /// Unix milliseconds at world construction.
    pub created_at: i64,
    pub cars: HashMap<String, CarState>,
    pub ball: BallState,
    pub score: ScoreState,
    pub events: Vec<GameplayEvent>,
}

/// State changes worth UI/audio feedback on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameplayEvent {
    #[serde(rename = "type")]
    pub kind: GameplayEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
    pub occurred_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameplayEventKind {
    Goal,
    Save,
    ShotOnGoal,
    Demo,
    Kickoff,
    PlayerJoin,
    PlayerLeave,
}

/// Matchmaking entry request. Defaults are applied by the queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueJoinRequest {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub playlist: String,
    #[serde(default)]
    pub mmr: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJoinResponse {
    pub ticket_id: String,
    pub status: QueueStatus,
}

/// Ticket lifecycle status. `NotFound` only ever appears in poll responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Searching,
    Matched,
    Cancelled,
    NotFound,
}

/// Returned once a ticket is matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchAssignment {
    pub ticket_id: String,
    pub match_id: String,
    pub region: String,
    pub playlist: String,
    pub players: Vec<String>,
    pub bot_fill: bool,
    pub server_addr: String,
    pub found_at_unix: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuePollResponse {
    pub ticket_id: String,
    pub status: QueueStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<MatchAssignment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuestAuthRequest {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestAuthResponse {
    pub player_id: String,
    pub display_name: String,
    pub token: String,
    pub expires_at: i64,
}

/// A gameplay/platform event ingested by the telemetry service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Team::Orange).unwrap(), "\"orange\"");
        assert_eq!(serde_json::to_string(&Team::Blue).unwrap(), "\"blue\"");
    }

    #[test]
    fn car_input_decodes_partial_payload() {
        let input: CarInput = serde_json::from_str("{\"throttle\":0.5}").unwrap();
        assert_eq!(input.throttle, 0.5);
        assert_eq!(input.steer, 0.0);
        assert!(!input.boost);
    }

    #[test]
    fn gameplay_event_kind_uses_snake_case_tags() {
        let event = GameplayEvent {
            kind: GameplayEventKind::ShotOnGoal,
            player_id: None,
            team: Some(Team::Blue),
            occurred_ms: 42,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "shot_on_goal");
        assert_eq!(json["team"], "blue");
        assert!(json.get("player_id").is_none());
    }
}
