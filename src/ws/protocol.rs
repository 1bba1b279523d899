//! WebSocket wire envelopes
//!
//! Clients send small tagged JSON objects; the server answers with full
//! self-contained state envelopes (no delta compression).

use serde::{Deserialize, Serialize};

use crate::types::{CarInput, MatchState};

/// Envelope sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEnvelope {
    /// Per-tick control input. Missing payloads are answered with a
    /// `missing_input` error instead of closing the connection.
    Input {
        #[serde(default)]
        input: Option<Box<CarInput>>,
    },

    /// Latency probe, answered with `pong`.
    Ping,

    /// Any unrecognized message type. Kept as a variant so the read pump can
    /// answer `unsupported_message_type` and keep the connection open.
    #[serde(other)]
    Unknown,
}

/// Envelope sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEnvelope {
    /// First message after connect, carrying a full snapshot.
    Welcome {
        state: Box<MatchState>,
        server_ms: i64,
        message: String,
    },

    /// Full match state, broadcast at the replication cadence.
    State {
        tick: u64,
        state: Box<MatchState>,
        server_ms: i64,
        /// Reserved for client-side reconciliation; never populated.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ack_seq: Option<u64>,
    },

    Pong {
        server_ms: i64,
    },

    /// Short machine-readable failure code, e.g. `bad_payload`.
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_envelope_decodes() {
        let json = r#"{"type":"input","input":{"player_id":"p1","throttle":1,"steer":-0.5}}"#;
        let envelope: ClientEnvelope = serde_json::from_str(json).unwrap();
        match envelope {
            ClientEnvelope::Input { input: Some(input) } => {
                assert_eq!(input.player_id, "p1");
                assert_eq!(input.throttle, 1.0);
                assert_eq!(input.steer, -0.5);
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn input_envelope_without_payload_decodes_to_none() {
        let envelope: ClientEnvelope = serde_json::from_str(r#"{"type":"input"}"#).unwrap();
        assert!(matches!(envelope, ClientEnvelope::Input { input: None }));
    }

    #[test]
    fn ping_envelope_decodes() {
        let envelope: ClientEnvelope = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(envelope, ClientEnvelope::Ping));
    }

    #[test]
    fn unknown_type_decodes_to_unknown() {
        let envelope: ClientEnvelope = serde_json::from_str(r#"{"type":"hello"}"#).unwrap();
        assert!(matches!(envelope, ClientEnvelope::Unknown));
    }

    #[test]
    fn state_envelope_serializes_with_snake_case_tag() {
        let envelope = ServerEnvelope::State {
            tick: 7,
            state: Box::new(MatchState::default()),
            server_ms: 1234,
            ack_seq: None,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "state");
        assert_eq!(json["tick"], 7);
        assert!(json.get("ack_seq").is_none());
    }

    #[test]
    fn error_envelope_round_trips() {
        let envelope = ServerEnvelope::Error {
            message: "bad_payload".to_string(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("bad_payload"));
    }
}
