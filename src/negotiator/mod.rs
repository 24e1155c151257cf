//! Negotiation-engine boundary
//!
//! The real-time transport engine is driven through a narrow command trait
//! plus a typed event stream, so the session state machine never depends on a
//! concrete media stack. The webrtc-rs implementation lives in `engine.rs`.

pub mod engine;

pub use engine::WebRtcEngine;

use crate::config::RelayServerConfig;
use crate::error::PeerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A session description (offer or answer) in transit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    /// Description kind: "offer" or "answer"
    pub kind: String,
    /// The SDP body
    pub sdp: String,
}

/// A connectivity-candidate descriptor as exchanged on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateInit {
    pub candidate: String,

    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,

    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_mline_index: Option<u16>,
}

/// Coarse connectivity state reported by the engine.
///
/// Observational only: state changes are logged and never drive the session
/// state machine (cleanup is exclusively `close()`-driven).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectivityState::New => "new",
            ConnectivityState::Connecting => "connecting",
            ConnectivityState::Connected => "connected",
            ConnectivityState::Disconnected => "disconnected",
            ConnectivityState::Failed => "failed",
            ConnectivityState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// Kind of an inbound transport resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A data channel, matched by its label
    Data,
    /// A media stream, matched by its stream identifier
    Media,
}

/// An inbound transport resource (data channel or media stream) created by
/// the engine during negotiation. Owned by the engine; sessions hold shared
/// references only.
pub trait RemoteResource: Send + Sync {
    /// Label used to match the resource against configured channel names.
    fn label(&self) -> String;

    fn kind(&self) -> ResourceKind;

    /// Release the resource. Fire-and-forget: implementations may defer the
    /// actual teardown to a background task.
    fn close(&self);
}

/// Events the engine surfaces to the session.
pub enum NegotiatorEvent {
    /// A local connectivity candidate was discovered
    LocalCandidate(CandidateInit),
    /// The connectivity state changed
    ConnectivityState(ConnectivityState),
    /// The remote side created a data channel or media stream
    ResourceCreated(Arc<dyn RemoteResource>),
}

impl fmt::Debug for NegotiatorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiatorEvent::LocalCandidate(c) => f.debug_tuple("LocalCandidate").field(c).finish(),
            NegotiatorEvent::ConnectivityState(s) => {
                f.debug_tuple("ConnectivityState").field(s).finish()
            }
            NegotiatorEvent::ResourceCreated(r) => f
                .debug_struct("ResourceCreated")
                .field("label", &r.label())
                .field("kind", &r.kind())
                .finish(),
        }
    }
}

/// Command surface of one negotiation-engine instance.
#[async_trait]
pub trait SessionNegotiator: Send {
    /// Install the remote peer's session description.
    async fn apply_remote_description(&self, desc: SessionDescription) -> Result<(), PeerError>;

    /// Generate the local answer description, install it locally, and return
    /// it for outbound relay.
    async fn create_answer(&self) -> Result<SessionDescription, PeerError>;

    /// Apply a remote connectivity candidate.
    async fn add_remote_candidate(&self, candidate: CandidateInit) -> Result<(), PeerError>;

    /// Tear down the engine instance.
    async fn close(&self);
}

/// Creates engine instances configured for one negotiation.
#[async_trait]
pub trait NegotiatorFactory: Send + Sync {
    /// Build an engine configured with the given relay servers, delivering
    /// its events through `events`.
    async fn create(
        &self,
        relay_servers: &[RelayServerConfig],
        events: mpsc::UnboundedSender<NegotiatorEvent>,
    ) -> Result<Box<dyn SessionNegotiator>, PeerError>;
}
