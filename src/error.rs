//! Crate-wide error type for peer session operations.

use std::error::Error;
use std::fmt;

/// Errors surfaced by the peer session and its collaborators.
///
/// Every variant is terminal for the operation that produced it but never
/// fatal to the process: callers log and leave the session in its current
/// state.
#[derive(Debug)]
pub enum PeerError {
    /// Control-plane session setup RPC failed
    ControlPlane(String),
    /// Signaling transport open/read/write failed
    Signaling(String),
    /// Negotiation engine rejected a command
    Negotiation(String),
    /// Operation not valid in the current session state
    InvalidState(String),
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerError::ControlPlane(msg) => write!(f, "Control-plane error: {}", msg),
            PeerError::Signaling(msg) => write!(f, "Signaling error: {}", msg),
            PeerError::Negotiation(msg) => write!(f, "Negotiation error: {}", msg),
            PeerError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl Error for PeerError {}
