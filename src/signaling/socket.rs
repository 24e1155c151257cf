//! Line-framed Unix-socket signaling transport
//!
//! The relay point listens on a local Unix socket. Each signaling message is
//! one line of JSON; the very first line written after connecting is the
//! session token that attaches the connection to its session.

use super::{SignalingConnector, SignalingTransport};
use crate::error::PeerError;
use async_trait::async_trait;
use log::{debug, warn};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::{
    unix::{OwnedReadHalf, OwnedWriteHalf},
    UnixStream,
};

/// Connects to the signaling relay over a local Unix socket.
pub struct UnixSocketConnector {
    path: PathBuf,
}

impl UnixSocketConnector {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SignalingConnector for UnixSocketConnector {
    async fn open(&self) -> Result<Box<dyn SignalingTransport>, PeerError> {
        let stream = UnixStream::connect(&self.path).await.map_err(|e| {
            PeerError::Signaling(format!(
                "Failed to connect signaling socket {}: {}",
                self.path.display(),
                e
            ))
        })?;
        debug!("Signaling socket connected: {}", self.path.display());

        let (read_half, write_half) = stream.into_split();
        Ok(Box::new(UnixSocketSignaling {
            lines: BufReader::new(read_half).lines(),
            writer: write_half,
        }))
    }
}

/// One established signaling connection, newline-delimited both ways.
///
/// Inbound lines are read through `Lines::next_line`, which is cancellation
/// safe: a read cancelled mid-line (the drive loop races reads against engine
/// events) leaves the partial line buffered and the next call resumes it.
pub struct UnixSocketSignaling {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

#[async_trait]
impl SignalingTransport for UnixSocketSignaling {
    async fn send(&mut self, text: &str) -> Result<(), PeerError> {
        self.writer
            .write_all(text.as_bytes())
            .await
            .map_err(|e| PeerError::Signaling(format!("Signaling write failed: {}", e)))?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(|e| PeerError::Signaling(format!("Signaling write failed: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| PeerError::Signaling(format!("Signaling flush failed: {}", e)))
    }

    async fn recv(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(line) => line,
            Err(e) => {
                warn!("Signaling read failed: {}", e);
                None
            }
        }
    }
}
