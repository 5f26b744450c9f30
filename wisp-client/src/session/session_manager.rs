use crate::error::{Result, WispError};
use crate::link::LinkState;
use crate::session::{
    DepartureReason, HandshakeStage, LinkOp, OutboundSignal, PeerSession, PendingDescriptor,
    RoomEvent, Role, SessionCommand, SessionId, SessionInfo, SessionState, TimerId,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use wisp_core::{PeerId, PeerRef, PeerSummary, SignalEnvelope, SignalKind};

/// Display name used for a peer whose join notification has not arrived yet.
pub const PLACEHOLDER_NAME: &str = "Unknown";

#[derive(Deserialize)]
struct ExistingPeersData {
    peers: Vec<PeerSummary>,
}

/// Handshake and teardown state machine for every known peer of one room.
///
/// All methods run to completion synchronously. Side effects are queued as
/// [`SessionCommand`]s and picked up with [`take_commands`](Self::take_commands),
/// so a buffered descriptor is always re-applied after the transition that
/// released it, never from inside a callback.
pub struct PeerSessionManager {
    local: PeerId,
    grace_period: Duration,
    sessions: BTreeMap<PeerId, PeerSession>,
    next_session: u64,
    next_timer: u64,
    commands: Vec<SessionCommand>,
}

impl PeerSessionManager {
    pub fn new(local: PeerId, grace_period: Duration) -> Self {
        Self {
            local,
            grace_period,
            sessions: BTreeMap::new(),
            next_session: 1,
            next_timer: 1,
            commands: Vec::new(),
        }
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.local
    }

    pub fn session(&self, peer: &PeerId) -> Option<&PeerSession> {
        self.sessions.get(peer)
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.sessions.values().map(PeerSession::info).collect()
    }

    pub fn take_commands(&mut self) -> Vec<SessionCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Dispatches an envelope delivered by the signaling transport.
    pub fn on_envelope(&mut self, envelope: SignalEnvelope) {
        let SignalEnvelope {
            kind, from, data, ..
        } = envelope;

        match kind {
            SignalKind::ExistingPeers => match serde_json::from_value::<ExistingPeersData>(data) {
                Ok(snapshot) => self.on_existing_peers(snapshot.peers),
                Err(e) => warn!("Dropping existing-peers: {}", WispError::MalformedEnvelope(e)),
            },
            _ if from == self.local => debug!("Ignoring own {} envelope", kind),
            SignalKind::Join => {
                let name = data
                    .get("username")
                    .and_then(Value::as_str)
                    .unwrap_or(PLACEHOLDER_NAME)
                    .to_owned();
                self.on_peer_joined(from, name);
            }
            SignalKind::Leave => self.on_peer_left(&from),
            SignalKind::Offer | SignalKind::Answer | SignalKind::IceCandidate => {
                self.on_signal(&from, kind, data)
            }
            SignalKind::Ping => {}
            SignalKind::Unknown => debug!("Ignoring envelope of unknown type from {}", from),
        }
    }

    pub fn on_existing_peers(&mut self, peers: Vec<PeerSummary>) {
        for peer in peers {
            self.on_peer_joined(peer.user_id, peer.username);
        }
    }

    pub fn on_peer_joined(&mut self, peer: PeerId, display_name: impl Into<String>) {
        if peer == self.local {
            return;
        }

        if let Some(session) = self.sessions.get_mut(&peer) {
            if session.placeholder_name {
                session.peer.display_name = display_name.into();
                session.placeholder_name = false;
            } else {
                debug!("Peer {} already known", peer);
            }
            return;
        }

        let role = self.open_session(PeerRef::new(peer.clone(), display_name), false);
        if role == Role::Initiator {
            self.start_offer(&peer);
        }
    }

    pub fn on_peer_left(&mut self, peer: &PeerId) {
        self.terminate(peer, SessionState::Closed, DepartureReason::Left);
    }

    /// Handles a handshake message received from `from`. Only an offer may
    /// open a session; anything else from an unknown peer is dropped unseen.
    pub fn on_signal(&mut self, from: &PeerId, kind: SignalKind, data: Value) {
        if !self.sessions.contains_key(from) {
            if kind != SignalKind::Offer {
                debug!("Dropping {} from {} without a session", kind, from);
                return;
            }
            self.open_session(PeerRef::new(from.clone(), PLACEHOLDER_NAME), true);
        }

        match kind {
            SignalKind::Offer => self.handle_offer(from, data.clone()),
            SignalKind::Answer => self.handle_answer(from, data.clone()),
            SignalKind::IceCandidate => {
                if let Some(session) = self.sessions.get(from) {
                    self.commands.push(SessionCommand::Link {
                        peer: from.clone(),
                        session: session.id,
                        op: LinkOp::AddCandidate(data.clone()),
                    });
                }
            }
            _ => return,
        }

        self.commands.push(SessionCommand::Notify(RoomEvent::Signal {
            from: from.clone(),
            kind,
            data,
        }));
    }

    pub fn on_offer_ready(&mut self, peer: &PeerId, session: SessionId, offer: Value) {
        let Some(s) = current(&mut self.sessions, peer, session) else {
            return;
        };
        if s.stage != HandshakeStage::CreatingOffer {
            warn!("Offer for {} produced in stage {:?}, ignoring", peer, s.stage);
            return;
        }

        s.stage = HandshakeStage::AwaitingAnswer;
        self.commands.push(SessionCommand::Send(OutboundSignal::directed(
            peer.clone(),
            SignalKind::Offer,
            offer,
        )));
        self.settle(peer);
    }

    pub fn on_answer_ready(&mut self, peer: &PeerId, session: SessionId, answer: Value) {
        let Some(s) = current(&mut self.sessions, peer, session) else {
            return;
        };
        if s.stage != HandshakeStage::CreatingAnswer {
            warn!("Answer for {} produced in stage {:?}, ignoring", peer, s.stage);
            return;
        }

        s.stage = HandshakeStage::Stable;
        self.commands.push(SessionCommand::Send(OutboundSignal::directed(
            peer.clone(),
            SignalKind::Answer,
            answer,
        )));
        self.settle(peer);
    }

    /// A link operation failed; the session cannot continue.
    pub fn on_link_error(&mut self, peer: &PeerId, session: SessionId, error: &str) {
        if current(&mut self.sessions, peer, session).is_none() {
            return;
        }
        warn!("Link to {} failed: {}", peer, error);
        self.terminate(peer, SessionState::Failed, DepartureReason::LinkFailed);
    }

    pub fn on_local_candidate(&mut self, peer: &PeerId, session: SessionId, candidate: Value) {
        if current(&mut self.sessions, peer, session).is_none() {
            debug!("Dropping local candidate for closed session with {}", peer);
            return;
        }
        self.commands.push(SessionCommand::Send(OutboundSignal::directed(
            peer.clone(),
            SignalKind::IceCandidate,
            candidate,
        )));
    }

    pub fn on_link_state_change(&mut self, peer: &PeerId, session: SessionId, state: LinkState) {
        let grace_period = self.grace_period;
        let Some(s) = self.sessions.get_mut(peer).filter(|s| s.id == session) else {
            debug!("Ignoring {:?} from stale link of {}", state, peer);
            return;
        };

        match state {
            LinkState::Connecting => {
                if s.state == SessionState::Idle {
                    transition(&mut self.commands, s, SessionState::Connecting);
                }
            }
            LinkState::Connected => {
                if matches!(
                    s.state,
                    SessionState::Idle | SessionState::Connecting | SessionState::GraceDisconnected
                ) {
                    if let Some(timer) = s.grace_timer.take() {
                        self.commands
                            .push(SessionCommand::CancelGraceTimer { timer });
                    }
                    transition(&mut self.commands, s, SessionState::Connected);
                }
            }
            LinkState::Disconnected => {
                if s.state == SessionState::Connected {
                    let timer = TimerId(self.next_timer);
                    self.next_timer += 1;
                    s.grace_timer = Some(timer);
                    self.commands.push(SessionCommand::ArmGraceTimer {
                        peer: peer.clone(),
                        timer,
                        after: grace_period,
                    });
                    transition(&mut self.commands, s, SessionState::GraceDisconnected);
                }
            }
            LinkState::Failed => {
                self.terminate(peer, SessionState::Failed, DepartureReason::LinkFailed)
            }
            LinkState::Closed => {
                self.terminate(peer, SessionState::Closed, DepartureReason::LinkClosed)
            }
        }
    }

    /// Grace window elapsed. Ignored unless `timer` is the one currently armed.
    pub fn on_grace_expired(&mut self, peer: &PeerId, timer: TimerId) {
        let Some(s) = self.sessions.get_mut(peer) else {
            return;
        };
        if s.grace_timer != Some(timer) {
            debug!("Ignoring stale grace timer {:?} for {}", timer, peer);
            return;
        }
        s.grace_timer = None;
        info!("Peer {} did not recover within the grace period", peer);
        self.terminate(peer, SessionState::Closed, DepartureReason::GraceExpired);
    }

    /// Starts a fresh offer on an established session.
    pub fn renegotiate(&mut self, peer: &PeerId) -> Result<()> {
        let Some(s) = self.sessions.get(peer) else {
            return Err(WispError::UnknownPeerTarget(peer.clone()));
        };
        if s.state != SessionState::Connected {
            return Err(WispError::RenegotiationRejected {
                peer: peer.clone(),
                reason: "session is not connected",
            });
        }
        if s.stage != HandshakeStage::Stable {
            return Err(WispError::RenegotiationRejected {
                peer: peer.clone(),
                reason: "a handshake is already in progress",
            });
        }

        self.start_offer(peer);
        Ok(())
    }

    /// Tears down every link without reporting departures. Used when the
    /// local peer leaves or the room is lost.
    pub fn close_all(&mut self) {
        for (peer, mut session) in std::mem::take(&mut self.sessions) {
            if let Some(timer) = session.grace_timer.take() {
                self.commands.push(SessionCommand::CancelGraceTimer { timer });
            }
            self.commands.push(SessionCommand::Close {
                peer,
                session: session.id,
            });
        }
    }

    /// Signaling was re-established after a drop. Announcements may have been
    /// missed meanwhile, so every session is torn down and reported; the
    /// snapshot the directory sends on rejoin seeds fresh ones.
    pub fn on_signaling_reset(&mut self) {
        let peers: Vec<PeerId> = self.sessions.keys().cloned().collect();
        if !peers.is_empty() {
            info!("Signaling reset, dropping {} session(s)", peers.len());
        }
        for peer in peers {
            self.terminate(&peer, SessionState::Closed, DepartureReason::SignalingInterrupted);
        }
    }

    fn open_session(&mut self, peer: PeerRef, placeholder_name: bool) -> Role {
        let id = SessionId(self.next_session);
        self.next_session += 1;

        let role = Role::resolve(&self.local, &peer.id);
        info!("New session {:?} with {} as {:?}", id, peer.id, role);

        let mut session = PeerSession::new(peer.clone(), id, role);
        session.placeholder_name = placeholder_name;

        self.commands.push(SessionCommand::Open {
            peer: peer.id.clone(),
            session: id,
            role,
        });
        self.commands
            .push(SessionCommand::Notify(RoomEvent::PeerJoined(peer.clone())));
        self.sessions.insert(peer.id, session);
        role
    }

    fn start_offer(&mut self, peer: &PeerId) {
        let Some(s) = self.sessions.get_mut(peer) else {
            return;
        };
        s.stage = HandshakeStage::CreatingOffer;
        self.commands.push(SessionCommand::Link {
            peer: peer.clone(),
            session: s.id,
            op: LinkOp::CreateOffer,
        });
        if s.state == SessionState::Idle {
            transition(&mut self.commands, s, SessionState::Connecting);
        }
    }

    fn handle_offer(&mut self, peer: &PeerId, offer: Value) {
        let Some(s) = self.sessions.get_mut(peer) else {
            return;
        };

        match s.stage {
            HandshakeStage::Stable => self.accept_offer(peer, offer),
            HandshakeStage::AwaitingAnswer if s.role == Role::Responder => {
                // Glare: the responder yields, and re-offers once stable.
                debug!("Glare with {}, rolling back local offer", peer);
                s.abandoned_answers += 1;
                s.renegotiate_deferred = true;
                self.commands.push(SessionCommand::Link {
                    peer: peer.clone(),
                    session: s.id,
                    op: LinkOp::Rollback,
                });
                self.accept_offer(peer, offer);
            }
            stage => {
                debug!("Buffering offer from {} in stage {:?}", peer, stage);
                buffer(s, PendingDescriptor::Offer(offer));
            }
        }
    }

    fn handle_answer(&mut self, peer: &PeerId, answer: Value) {
        let Some(s) = self.sessions.get_mut(peer) else {
            debug!("Dropping answer from {} without a session", peer);
            return;
        };

        if s.abandoned_answers > 0 {
            s.abandoned_answers -= 1;
            debug!("Dropping answer from {} to a rolled-back offer", peer);
            return;
        }

        if s.stage.is_blocking() {
            debug!("Buffering answer from {} in stage {:?}", peer, s.stage);
            buffer(s, PendingDescriptor::Answer(answer));
            return;
        }

        if s.stage == HandshakeStage::AwaitingAnswer {
            s.stage = HandshakeStage::Stable;
            self.commands.push(SessionCommand::Link {
                peer: peer.clone(),
                session: s.id,
                op: LinkOp::ApplyAnswer(answer),
            });
            self.settle(peer);
        } else {
            debug!("Dropping answer from {} with no offer outstanding", peer);
        }
    }

    fn accept_offer(&mut self, peer: &PeerId, offer: Value) {
        let Some(s) = self.sessions.get_mut(peer) else {
            return;
        };
        s.stage = HandshakeStage::CreatingAnswer;
        self.commands.push(SessionCommand::Link {
            peer: peer.clone(),
            session: s.id,
            op: LinkOp::AcceptOffer(offer),
        });
        if s.state == SessionState::Idle {
            transition(&mut self.commands, s, SessionState::Connecting);
        }
    }

    /// Runs after every transition out of a blocking stage: re-applies the
    /// buffered descriptor, then any renegotiation deferred by glare.
    fn settle(&mut self, peer: &PeerId) {
        let pending = self.sessions.get_mut(peer).and_then(|s| s.pending.take());
        match pending {
            Some(PendingDescriptor::Offer(offer)) => self.handle_offer(peer, offer),
            Some(PendingDescriptor::Answer(answer)) => self.handle_answer(peer, answer),
            None => {}
        }

        let Some(s) = self.sessions.get_mut(peer) else {
            return;
        };
        if s.renegotiate_deferred && s.stage == HandshakeStage::Stable && s.pending.is_none() {
            s.renegotiate_deferred = false;
            debug!("Re-issuing offer to {} deferred by glare", peer);
            self.start_offer(peer);
        }
    }

    fn terminate(&mut self, peer: &PeerId, state: SessionState, reason: DepartureReason) {
        let Some(mut session) = self.sessions.remove(peer) else {
            return;
        };

        if let Some(timer) = session.grace_timer.take() {
            self.commands.push(SessionCommand::CancelGraceTimer { timer });
        }
        self.commands.push(SessionCommand::Close {
            peer: peer.clone(),
            session: session.id,
        });
        transition(&mut self.commands, &mut session, state);

        info!("Peer {} departed: {:?}", peer, reason);
        self.commands.push(SessionCommand::Notify(RoomEvent::PeerLeft {
            peer: session.peer,
            reason,
        }));
    }

}

fn current<'a>(
    sessions: &'a mut BTreeMap<PeerId, PeerSession>,
    peer: &PeerId,
    session: SessionId,
) -> Option<&'a mut PeerSession> {
    let found = sessions.get_mut(peer).filter(|s| s.id == session);
    if found.is_none() {
        debug!("Ignoring event from stale session {:?} of {}", session, peer);
    }
    found
}

fn transition(commands: &mut Vec<SessionCommand>, session: &mut PeerSession, state: SessionState) {
    if session.state == state {
        return;
    }
    debug!("{}: {} -> {}", session.peer.id, session.state, state);
    session.state = state;
    commands.push(SessionCommand::Notify(RoomEvent::LinkStateChanged {
        peer: session.peer.id.clone(),
        state,
    }));
}

fn buffer(session: &mut PeerSession, descriptor: PendingDescriptor) {
    if session.pending.replace(descriptor).is_some() {
        debug!("Replacing buffered descriptor of {}", session.peer.id);
    }
}
