//! Peer session state machine
//!
//! `PeerSession` orchestrates one remote peer's transport session:
//!
//! - establishment: control-plane `Connect` RPC, signaling transport open,
//!   session-token handshake
//! - message routing: inbound `func`-tagged signaling messages dispatched to
//!   their handlers, unknown kinds ignored
//! - negotiation: lazy engine creation on the first remote offer, answer and
//!   candidate relay back through the signaling transport
//! - channel binding: inbound data channels and media streams matched to the
//!   configured channel names
//!
//! All session state is mutated from one task. The drive loop multiplexes the
//! signaling transport and the engine event channel with `tokio::select!`, so
//! no internal locking is needed.

use crate::broker::ControlPlaneBroker;
use crate::channel::{Channel, ChannelBinder};
use crate::config::{RelayServerConfig, SessionConfig};
use crate::error::PeerError;
use crate::negotiator::{
    CandidateInit, NegotiatorEvent, NegotiatorFactory, SessionDescription, SessionNegotiator,
};
use crate::signaling::{
    parse_relay_servers, SignalingConnector, SignalingMessage, SignalingTransport,
};
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Lifecycle states of a peer session. `Closed` is terminal and reachable
/// from every other state via `close()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    EstablishingControlPlane,
    AwaitingTransport,
    SignalingReady,
    Negotiating,
    AwaitingConnectivity,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Created => "created",
            SessionState::EstablishingControlPlane => "establishing-control-plane",
            SessionState::AwaitingTransport => "awaiting-transport",
            SessionState::SignalingReady => "signaling-ready",
            SessionState::Negotiating => "negotiating",
            SessionState::AwaitingConnectivity => "awaiting-connectivity",
            SessionState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// One remote peer's signaling session.
pub struct PeerSession {
    id: String,
    state: SessionState,
    binder: ChannelBinder,
    relay_servers: Vec<RelayServerConfig>,

    broker: Arc<dyn ControlPlaneBroker>,
    connector: Arc<dyn SignalingConnector>,
    factory: Arc<dyn NegotiatorFactory>,

    negotiator: Option<Box<dyn SessionNegotiator>>,
    transport: Option<Box<dyn SignalingTransport>>,
    /// Transport handle parked by `close()` until in-flight delivery drains.
    /// Dropped when the drive loop exits, or with the session itself.
    pending_release: Option<Box<dyn SignalingTransport>>,

    events_tx: mpsc::UnboundedSender<NegotiatorEvent>,
    events_rx: mpsc::UnboundedReceiver<NegotiatorEvent>,
}

enum Step {
    Inbound(Option<String>),
    Engine(Option<NegotiatorEvent>),
}

impl PeerSession {
    pub fn new(
        id: String,
        config: &SessionConfig,
        broker: Arc<dyn ControlPlaneBroker>,
        connector: Arc<dyn SignalingConnector>,
        factory: Arc<dyn NegotiatorFactory>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            id,
            state: SessionState::Created,
            binder: ChannelBinder::new(&config.channels),
            relay_servers: config.relay_servers.clone(),
            broker,
            connector,
            factory,
            negotiator: None,
            transport: None,
            pending_release: None,
            events_tx,
            events_rx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn relay_servers(&self) -> &[RelayServerConfig] {
        &self.relay_servers
    }

    pub fn channels(&self) -> &[Channel] {
        self.binder.channels()
    }

    /// Run the establishment handshake: broker RPC, transport open, token
    /// presentation. On failure the session halts in its current state; it is
    /// never torn down automatically and `close()` stays safe to call.
    pub async fn establish(&mut self) -> Result<(), PeerError> {
        if self.state != SessionState::Created {
            return Err(PeerError::InvalidState(format!(
                "establish() called in state {}",
                self.state
            )));
        }

        self.state = SessionState::EstablishingControlPlane;
        let channel_names: Vec<String> = self
            .binder
            .channels()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        info!("Session {}: requesting control-plane setup", self.id);

        let token = match self.broker.connect(&self.id, &channel_names).await {
            Ok(token) => token,
            Err(e) => {
                error!("Session {}: control-plane setup failed: {}", self.id, e);
                return Err(e);
            }
        };

        self.state = SessionState::AwaitingTransport;
        let mut transport = match self.connector.open().await {
            Ok(t) => t,
            Err(e) => {
                error!("Session {}: signaling transport open failed: {}", self.id, e);
                return Err(e);
            }
        };

        // The token is the first message on the wire; a write failure means
        // the transport never attached to the session, so drop it.
        if let Err(e) = transport.send(&token).await {
            error!("Session {}: token presentation failed: {}", self.id, e);
            return Err(e);
        }

        self.transport = Some(transport);
        self.state = SessionState::SignalingReady;
        info!("Session {}: signaling ready", self.id);
        Ok(())
    }

    /// Drive the session until the transport closes or the session reaches
    /// `Closed`. Inbound messages and engine events are processed in delivery
    /// order, one at a time.
    pub async fn run(&mut self) {
        loop {
            if self.state == SessionState::Closed {
                break;
            }

            // The session holds its own events_tx, so the event channel alone
            // can never signal completion; without a transport there is
            // nothing left to drive.
            let step = match self.transport.as_mut() {
                Some(transport) => tokio::select! {
                    line = transport.recv() => Step::Inbound(line),
                    event = self.events_rx.recv() => Step::Engine(event),
                },
                None => {
                    debug!("Session {}: no signaling transport to drive", self.id);
                    break;
                }
            };

            match step {
                Step::Inbound(Some(line)) => self.handle_line(&line).await,
                Step::Inbound(None) => {
                    info!("Session {}: signaling transport closed", self.id);
                    break;
                }
                Step::Engine(Some(event)) => self.handle_event(event).await,
                Step::Engine(None) => break,
            }
        }

        // Completion point for deferred teardown: no further delivery can be
        // in flight once the loop has exited.
        self.pending_release = None;
    }

    /// Parse and dispatch one inbound signaling line. Unparseable input is
    /// ignored and never alters session state.
    async fn handle_line(&mut self, line: &str) {
        match SignalingMessage::from_json(line) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => debug!("Session {}: ignoring inbound message: {}", self.id, e),
        }
    }

    async fn dispatch(&mut self, message: SignalingMessage) {
        match message {
            SignalingMessage::TurnInfo { servers } => match parse_relay_servers(&servers) {
                Some(list) => {
                    info!(
                        "Session {}: relay-server list replaced ({} entries)",
                        self.id,
                        list.len()
                    );
                    self.relay_servers = list;
                    if self.negotiator.is_some() {
                        debug!(
                            "Session {}: negotiation already running, new relay list is inert",
                            self.id
                        );
                    }
                }
                None => warn!("Session {}: ignoring malformed TurnInfo payload", self.id),
            },
            SignalingMessage::RemoteOffer { sdp, kind } => {
                self.handle_remote_offer(kind, sdp).await;
            }
            SignalingMessage::RemoteIceCandidate { candidate } => {
                self.handle_remote_candidate(candidate).await;
            }
            SignalingMessage::Answer { .. }
            | SignalingMessage::IceCandidate { .. }
            | SignalingMessage::Close => {
                debug!("Session {}: ignoring outbound-only message kind", self.id);
            }
        }
    }

    /// Apply a remote offer: create the engine on first offer (renegotiation
    /// reuses the existing instance), install the remote description, then
    /// generate and relay the answer. Engine failures leave the session in
    /// `Negotiating` with no retry.
    async fn handle_remote_offer(&mut self, kind: String, sdp: String) {
        self.state = SessionState::Negotiating;

        if self.negotiator.is_none() {
            match self
                .factory
                .create(&self.relay_servers, self.events_tx.clone())
                .await
            {
                Ok(negotiator) => self.negotiator = Some(negotiator),
                Err(e) => {
                    error!("Session {}: engine creation failed: {}", self.id, e);
                    return;
                }
            }
        } else {
            info!("Session {}: renegotiation offer on existing engine", self.id);
        }

        let Some(negotiator) = self.negotiator.as_ref() else {
            return;
        };

        if let Err(e) = negotiator
            .apply_remote_description(SessionDescription { kind, sdp })
            .await
        {
            error!("Session {}: failed to apply remote offer: {}", self.id, e);
            return;
        }

        let answer = match negotiator.create_answer().await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Session {}: answer generation failed: {}", self.id, e);
                return;
            }
        };

        let message = SignalingMessage::Answer {
            kind: answer.kind,
            sdp: answer.sdp,
        };
        match Self::send(&mut self.transport, &message).await {
            Ok(()) => {
                self.state = SessionState::AwaitingConnectivity;
                info!("Session {}: answer sent, awaiting connectivity", self.id);
            }
            Err(e) => warn!("Session {}: failed to send answer: {}", self.id, e),
        }
    }

    async fn handle_remote_candidate(&mut self, candidate: CandidateInit) {
        match self.negotiator.as_ref() {
            Some(negotiator) => {
                if let Err(e) = negotiator.add_remote_candidate(candidate).await {
                    warn!("Session {}: failed to apply remote candidate: {}", self.id, e);
                }
            }
            None => warn!(
                "Session {}: remote candidate before any offer, dropping",
                self.id
            ),
        }
    }

    /// Handle one engine event. Connectivity-state changes are observational
    /// only; cleanup stays exclusively `close()`-driven.
    async fn handle_event(&mut self, event: NegotiatorEvent) {
        match event {
            NegotiatorEvent::LocalCandidate(candidate) => {
                let message = SignalingMessage::IceCandidate { candidate };
                if let Err(e) = Self::send(&mut self.transport, &message).await {
                    warn!("Session {}: failed to send local candidate: {}", self.id, e);
                }
            }
            NegotiatorEvent::ConnectivityState(state) => {
                info!("Session {}: connectivity state {}", self.id, state);
            }
            NegotiatorEvent::ResourceCreated(resource) => {
                self.binder.bind(resource);
            }
        }
    }

    /// Tear the session down. Idempotent; safe in every state, including
    /// before any transport or negotiator exists.
    ///
    /// Order: release bound channel resources, clear the channel set, send a
    /// best-effort `Close` notification, close the engine, park the transport
    /// handle for deferred release.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            debug!("Session {}: already closed", self.id);
            return;
        }

        info!("Session {}: closing", self.id);
        self.binder.release_all();

        if self.transport.is_some() {
            if let Err(e) = Self::send(&mut self.transport, &SignalingMessage::Close).await {
                warn!("Session {}: failed to send close notification: {}", self.id, e);
            }
        }

        if let Some(negotiator) = self.negotiator.take() {
            negotiator.close().await;
        }

        self.pending_release = self.transport.take();
        self.state = SessionState::Closed;
    }

    async fn send(
        transport: &mut Option<Box<dyn SignalingTransport>>,
        message: &SignalingMessage,
    ) -> Result<(), PeerError> {
        let text = message.to_json()?;
        match transport.as_mut() {
            Some(transport) => transport.send(&text).await,
            None => Err(PeerError::Signaling(
                "No signaling transport".to_string(),
            )),
        }
    }
}
