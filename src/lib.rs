//! rtc-peer - peer session signaling core
//!
//! Manages the lifecycle of one remote peer's real-time transport session:
//! control-plane setup, signaling message exchange, negotiation-engine
//! driving, and binding of inbound transport resources to named channels.

pub mod broker;
pub mod channel;
pub mod config;
pub mod error;
pub mod negotiator;
pub mod session;
pub mod signaling;

// Re-exports
pub use broker::ControlPlaneBroker;
pub use channel::{BindOutcome, Channel, ChannelBinder};
pub use config::{RelayServerConfig, SessionConfig};
pub use error::PeerError;
pub use negotiator::{
    CandidateInit, ConnectivityState, NegotiatorEvent, NegotiatorFactory, RemoteResource,
    ResourceKind, SessionDescription, SessionNegotiator, WebRtcEngine,
};
pub use session::{PeerSession, SessionState};
pub use signaling::{SignalingConnector, SignalingMessage, SignalingTransport, UnixSocketConnector};
