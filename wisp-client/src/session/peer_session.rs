use serde_json::Value;
use std::fmt;
use wisp_core::{PeerId, PeerRef};

/// Which side drives the handshake for a pair of peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    /// The peer with the larger id initiates. Both ends compute this
    /// independently and always agree.
    pub fn resolve(local: &PeerId, remote: &PeerId) -> Self {
        if local > remote {
            Role::Initiator
        } else {
            Role::Responder
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    GraceDisconnected,
    Closed,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::GraceDisconnected => "grace-disconnected",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Where the descriptor exchange of a session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    Stable,
    /// Waiting for the link to produce a local offer.
    CreatingOffer,
    /// Local offer sent, answer outstanding.
    AwaitingAnswer,
    /// Remote offer applied, waiting for the link to produce the answer.
    CreatingAnswer,
}

impl HandshakeStage {
    /// Stages during which no inbound descriptor may be applied.
    pub fn is_blocking(self) -> bool {
        matches!(
            self,
            HandshakeStage::CreatingOffer | HandshakeStage::CreatingAnswer
        )
    }
}

/// Generation of a session. A peer that leaves and returns gets a new one,
/// so link events of the old session can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// Token of one armed grace timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum PendingDescriptor {
    Offer(Value),
    Answer(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureReason {
    /// The directory or bus announced the peer's departure.
    Left,
    /// The link dropped and did not recover within the grace period.
    GraceExpired,
    LinkFailed,
    LinkClosed,
    /// Signaling reconnected; the session is rebuilt from the new snapshot.
    SignalingInterrupted,
}

#[derive(Debug, Clone)]
pub struct PeerSession {
    pub peer: PeerRef,
    pub id: SessionId,
    pub role: Role,
    pub state: SessionState,
    pub stage: HandshakeStage,
    pub pending: Option<PendingDescriptor>,
    pub grace_timer: Option<TimerId>,
    /// Answers still in flight for local offers that were rolled back in glare.
    pub abandoned_answers: u32,
    /// A local offer was rolled back and must be re-issued once stable.
    pub renegotiate_deferred: bool,
    /// Display name not yet known; set when the session came from an offer.
    pub placeholder_name: bool,
}

impl PeerSession {
    pub fn new(peer: PeerRef, id: SessionId, role: Role) -> Self {
        Self {
            peer,
            id,
            role,
            state: SessionState::Idle,
            stage: HandshakeStage::Stable,
            pending: None,
            grace_timer: None,
            abandoned_answers: 0,
            renegotiate_deferred: false,
            placeholder_name: false,
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            peer: self.peer.clone(),
            role: self.role,
            state: self.state,
        }
    }
}

/// Read-only view of a session handed to the application.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub peer: PeerRef,
    pub role: Role,
    pub state: SessionState,
}
