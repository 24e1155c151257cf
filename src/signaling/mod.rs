//! Signaling-plane types and transports
//!
//! This module covers everything exchanged over the point-to-point signaling
//! link: the tagged message schema, and the line-framed socket transport the
//! session owns once established.

pub mod message;
pub mod socket;

pub use message::{parse_relay_servers, SignalingMessage};
pub use socket::{UnixSocketConnector, UnixSocketSignaling};

use crate::error::PeerError;
use async_trait::async_trait;

/// A duplex signaling channel delivering whole text messages.
///
/// Framing (newline/length delimiting) is the implementation's concern;
/// callers always see one complete message per call.
#[async_trait]
pub trait SignalingTransport: Send {
    /// Send one framed text message.
    async fn send(&mut self, text: &str) -> Result<(), PeerError>;

    /// Receive the next message; `None` means the transport closed.
    async fn recv(&mut self) -> Option<String>;
}

/// Opens a signaling transport toward the relay point.
#[async_trait]
pub trait SignalingConnector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn SignalingTransport>, PeerError>;
}
