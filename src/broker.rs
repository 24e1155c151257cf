//! Control-plane session setup
//!
//! Session establishment starts with an out-of-band RPC to a control-plane
//! broker, which allocates the session on the relay point and hands back an
//! opaque token. The token is presented on the signaling transport to attach
//! the connection to the allocated session.

use crate::error::PeerError;
use async_trait::async_trait;

/// RPC boundary toward the control-plane broker.
#[async_trait]
pub trait ControlPlaneBroker: Send + Sync {
    /// Register the peer and its channel names; returns the session token the
    /// signaling transport must present on connect.
    async fn connect(&self, local_peer_id: &str, channels: &[String])
        -> Result<String, PeerError>;
}
