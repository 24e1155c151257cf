//! Signaling message schema
//!
//! Wire format is single-line JSON with a `func` discriminator, matching the
//! broker-relayed protocol: `TurnInfo`, `RemoteOffer` and `RemoteICECandidate`
//! arrive inbound; `Answer`, `ICECandidate` and `Close` are sent outbound.

use crate::config::RelayServerConfig;
use crate::error::PeerError;
use crate::negotiator::CandidateInit;
use serde::{Deserialize, Serialize};

/// Signaling messages exchanged with the remote peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "func")]
pub enum SignalingMessage {
    /// Relay-server update. `servers` stays a raw value so a malformed
    /// payload still parses and can be ignored by the handler.
    TurnInfo { servers: serde_json::Value },

    /// Session-description offer from the remote peer
    RemoteOffer {
        sdp: String,
        #[serde(rename = "type")]
        kind: String,
    },

    /// Connectivity candidate from the remote peer
    #[serde(rename = "RemoteICECandidate")]
    RemoteIceCandidate { candidate: CandidateInit },

    /// Locally generated session-description answer
    Answer {
        #[serde(rename = "type")]
        kind: String,
        sdp: String,
    },

    /// Locally discovered connectivity candidate
    #[serde(rename = "ICECandidate")]
    IceCandidate { candidate: CandidateInit },

    /// Session teardown notification
    Close,
}

impl SignalingMessage {
    /// Parse a signaling message from JSON.
    ///
    /// Unrecognized `func` values and missing fields both surface here as
    /// errors; the router treats them as ignorable, not fatal.
    pub fn from_json(json: &str) -> Result<Self, PeerError> {
        serde_json::from_str(json)
            .map_err(|e| PeerError::Signaling(format!("Invalid signaling message: {}", e)))
    }

    /// Serialize to single-line JSON for the transport.
    pub fn to_json(&self) -> Result<String, PeerError> {
        serde_json::to_string(self)
            .map_err(|e| PeerError::Signaling(format!("Failed to serialize message: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct TurnServerEntry {
    url: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Convert a `TurnInfo.servers` payload into relay-server descriptors.
///
/// Returns `None` when the payload is not a list of well-formed entries, in
/// which case the previous relay configuration must be retained.
pub fn parse_relay_servers(servers: &serde_json::Value) -> Option<Vec<RelayServerConfig>> {
    if !servers.is_array() {
        return None;
    }

    let entries: Vec<TurnServerEntry> = serde_json::from_value(servers.clone()).ok()?;
    Some(
        entries
            .into_iter()
            .map(|entry| RelayServerConfig {
                urls: vec![entry.url],
                username: entry.username,
                credential: entry.password,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_remote_offer() {
        let json = r#"{"func": "RemoteOffer", "sdp": "v=0\r\n...", "type": "offer"}"#;
        let msg = SignalingMessage::from_json(json).unwrap();
        match msg {
            SignalingMessage::RemoteOffer { sdp, kind } => {
                assert!(sdp.starts_with("v=0"));
                assert_eq!(kind, "offer");
            }
            _ => panic!("Expected RemoteOffer"),
        }
    }

    #[test]
    fn parse_remote_candidate_field_spelling() {
        let json = r#"{"func":"RemoteICECandidate","candidate":{"candidate":"candidate:1 1 udp 2113937151 10.0.0.2 50000 typ host","sdpMid":"0","sdpMLineIndex":0}}"#;
        let msg = SignalingMessage::from_json(json).unwrap();
        match msg {
            SignalingMessage::RemoteIceCandidate { candidate } => {
                assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
                assert_eq!(candidate.sdp_mline_index, Some(0));
            }
            _ => panic!("Expected RemoteICECandidate"),
        }
    }

    #[test]
    fn unknown_discriminator_is_an_error() {
        assert!(SignalingMessage::from_json(r#"{"func": "Nonsense", "x": 1}"#).is_err());
    }

    #[test]
    fn answer_serializes_with_func_and_type() {
        let msg = SignalingMessage::Answer {
            kind: "answer".to_string(),
            sdp: "v=0...".to_string(),
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""func":"Answer""#));
        assert!(json.contains(r#""type":"answer""#));
        assert!(!json.contains("kind"));
    }

    #[test]
    fn close_has_no_payload() {
        let msg = SignalingMessage::Close;
        assert_eq!(msg.to_json().unwrap(), r#"{"func":"Close"}"#);
        assert!(matches!(
            SignalingMessage::from_json(r#"{"func":"Close"}"#).unwrap(),
            SignalingMessage::Close
        ));
    }

    #[test]
    fn turn_info_with_non_list_servers_still_parses() {
        let msg = SignalingMessage::from_json(r#"{"func":"TurnInfo","servers":"oops"}"#).unwrap();
        match msg {
            SignalingMessage::TurnInfo { servers } => {
                assert!(parse_relay_servers(&servers).is_none());
            }
            _ => panic!("Expected TurnInfo"),
        }
    }

    #[test]
    fn turn_info_servers_map_to_relay_descriptors() {
        let servers = json!([
            {"url": "turn:turn.example.org:3478", "username": "u", "password": "p"},
            {"url": "stun:stun.example.org:3478"}
        ]);
        let relays = parse_relay_servers(&servers).unwrap();
        assert_eq!(relays.len(), 2);
        assert_eq!(relays[0].urls, vec!["turn:turn.example.org:3478"]);
        assert_eq!(relays[0].username.as_deref(), Some("u"));
        assert_eq!(relays[0].credential.as_deref(), Some("p"));
        assert!(relays[1].username.is_none());
    }
}
