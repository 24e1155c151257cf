//! webrtc-rs backed negotiation engine
//!
//! Wraps one `RTCPeerConnection` per session behind the `SessionNegotiator`
//! trait and forwards engine callbacks into the typed event channel.

use super::{
    CandidateInit, ConnectivityState, NegotiatorEvent, NegotiatorFactory, RemoteResource,
    ResourceKind, SessionDescription, SessionNegotiator,
};
use crate::config::RelayServerConfig;
use crate::error::PeerError;
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

/// `NegotiatorFactory` backed by webrtc-rs.
pub struct WebRtcEngine;

#[async_trait]
impl NegotiatorFactory for WebRtcEngine {
    async fn create(
        &self,
        relay_servers: &[RelayServerConfig],
        events: mpsc::UnboundedSender<NegotiatorEvent>,
    ) -> Result<Box<dyn SessionNegotiator>, PeerError> {
        let pc = build_peer_connection(relay_servers).await?;
        install_handlers(&pc, events);
        Ok(Box::new(WebRtcNegotiator { pc }))
    }
}

/// One engine instance driving a single `RTCPeerConnection`.
pub struct WebRtcNegotiator {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl SessionNegotiator for WebRtcNegotiator {
    async fn apply_remote_description(&self, desc: SessionDescription) -> Result<(), PeerError> {
        let remote = match desc.kind.as_str() {
            "offer" => RTCSessionDescription::offer(desc.sdp)
                .map_err(|e| PeerError::Negotiation(format!("Invalid SDP offer: {}", e)))?,
            "answer" => RTCSessionDescription::answer(desc.sdp)
                .map_err(|e| PeerError::Negotiation(format!("Invalid SDP answer: {}", e)))?,
            other => {
                return Err(PeerError::Negotiation(format!(
                    "Unsupported description type: {}",
                    other
                )))
            }
        };

        self.pc
            .set_remote_description(remote)
            .await
            .map_err(|e| PeerError::Negotiation(format!("Failed to set remote description: {}", e)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| PeerError::Negotiation(format!("Failed to create answer: {}", e)))?;

        self.pc
            .set_local_description(answer.clone())
            .await
            .map_err(|e| PeerError::Negotiation(format!("Failed to set local description: {}", e)))?;

        // Prefer the installed description: it may carry gathered candidates.
        let desc = self.pc.local_description().await.unwrap_or(answer);
        Ok(SessionDescription {
            kind: desc.sdp_type.to_string(),
            sdp: desc.sdp,
        })
    }

    async fn add_remote_candidate(&self, candidate: CandidateInit) -> Result<(), PeerError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };

        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| PeerError::Negotiation(format!("Failed to add ICE candidate: {}", e)))
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            warn!("Engine close failed: {}", e);
        }
    }
}

/// Build a peer connection configured to receive audio and video.
async fn build_peer_connection(
    relay_servers: &[RelayServerConfig],
) -> Result<Arc<RTCPeerConnection>, PeerError> {
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .map_err(|e| PeerError::Negotiation(format!("Failed to register codecs: {}", e)))?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|e| PeerError::Negotiation(format!("Failed to register interceptors: {}", e)))?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let ice_servers = relay_servers
        .iter()
        .map(|server| RTCIceServer {
            urls: server.urls.clone(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect();

    let rtc_config = RTCConfiguration {
        ice_servers,
        ..Default::default()
    };

    let pc = api
        .new_peer_connection(rtc_config)
        .await
        .map_err(|e| PeerError::Negotiation(format!("Failed to create peer connection: {}", e)))?;
    let pc = Arc::new(pc);

    // Receive-direction media lines, the equivalent of offering to receive
    // audio and video. DTLS-SRTP key agreement is always on in webrtc-rs.
    for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
        let init = RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Recvonly,
            send_encodings: Vec::new(),
        };
        pc.add_transceiver_from_kind(kind, Some(init))
            .await
            .map_err(|e| PeerError::Negotiation(format!("Failed to add transceiver: {}", e)))?;
    }

    Ok(pc)
}

/// Forward engine callbacks into the typed event channel.
fn install_handlers(pc: &Arc<RTCPeerConnection>, events: mpsc::UnboundedSender<NegotiatorEvent>) {
    let candidate_events = events.clone();
    pc.on_ice_candidate(Box::new(move |candidate| {
        let events = candidate_events.clone();
        Box::pin(async move {
            match candidate {
                Some(c) => match c.to_json() {
                    Ok(init) => {
                        let _ = events.send(NegotiatorEvent::LocalCandidate(CandidateInit {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                        }));
                    }
                    Err(e) => warn!("Failed to serialize local candidate: {}", e),
                },
                None => debug!("Candidate gathering complete"),
            }
        })
    }));

    let state_events = events.clone();
    pc.on_peer_connection_state_change(Box::new(move |state| {
        let events = state_events.clone();
        Box::pin(async move {
            let _ = events.send(NegotiatorEvent::ConnectivityState(connectivity_state(state)));
        })
    }));

    let dc_events = events.clone();
    pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
        let events = dc_events.clone();
        Box::pin(async move {
            let resource = Arc::new(DataChannelResource { inner: dc });
            let _ = events.send(NegotiatorEvent::ResourceCreated(resource));
        })
    }));

    pc.on_track(Box::new(move |track, receiver, _transceiver| {
        let events = events.clone();
        Box::pin(async move {
            let resource = Arc::new(MediaStreamResource {
                stream_id: track.stream_id(),
                receiver,
            });
            let _ = events.send(NegotiatorEvent::ResourceCreated(resource));
        })
    }));
}

fn connectivity_state(state: RTCPeerConnectionState) -> ConnectivityState {
    match state {
        RTCPeerConnectionState::New => ConnectivityState::New,
        RTCPeerConnectionState::Connecting => ConnectivityState::Connecting,
        RTCPeerConnectionState::Connected => ConnectivityState::Connected,
        RTCPeerConnectionState::Disconnected => ConnectivityState::Disconnected,
        RTCPeerConnectionState::Failed => ConnectivityState::Failed,
        RTCPeerConnectionState::Closed => ConnectivityState::Closed,
        _ => ConnectivityState::New,
    }
}

/// A remotely created data channel, matched by label.
struct DataChannelResource {
    inner: Arc<RTCDataChannel>,
}

impl RemoteResource for DataChannelResource {
    fn label(&self) -> String {
        self.inner.label().to_string()
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Data
    }

    fn close(&self) {
        let dc = self.inner.clone();
        tokio::spawn(async move {
            if let Err(e) = dc.close().await {
                debug!("Data channel close failed: {}", e);
            }
        });
    }
}

/// A remotely added media stream, matched by stream identifier.
struct MediaStreamResource {
    stream_id: String,
    receiver: Arc<RTCRtpReceiver>,
}

impl RemoteResource for MediaStreamResource {
    fn label(&self) -> String {
        self.stream_id.clone()
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Media
    }

    fn close(&self) {
        let receiver = self.receiver.clone();
        tokio::spawn(async move {
            if let Err(e) = receiver.stop().await {
                debug!("Media receiver stop failed: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_mapping_covers_terminal_states() {
        assert_eq!(
            connectivity_state(RTCPeerConnectionState::Connected),
            ConnectivityState::Connected
        );
        assert_eq!(
            connectivity_state(RTCPeerConnectionState::Failed),
            ConnectivityState::Failed
        );
        assert_eq!(
            connectivity_state(RTCPeerConnectionState::Closed),
            ConnectivityState::Closed
        );
    }

    #[tokio::test]
    async fn factory_builds_engine_with_relay_config() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let servers = crate::config::default_relay_servers();
        let negotiator = WebRtcEngine.create(&servers, tx).await.unwrap();
        negotiator.close().await;
    }
}
