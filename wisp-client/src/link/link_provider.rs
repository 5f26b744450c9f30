use crate::session::{Role, SessionId, TimerId};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;
use wisp_core::PeerId;

/// Connection state as reported by a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Connected,
    /// Transient loss; the link may still recover.
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    State(LinkState),
    LocalCandidate(Value),
    OfferReady(Value),
    AnswerReady(Value),
    /// An operation failed and the link is unusable.
    Failed(String),
}

/// Everything that feeds back into a room's session manager.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Link {
        peer: PeerId,
        session: SessionId,
        event: LinkEvent,
    },
    GraceExpired {
        peer: PeerId,
        timer: TimerId,
    },
}

/// Callback handle given to a link when it is opened. Events are tagged with
/// the session they belong to, so reports from a replaced link are ignored.
#[derive(Debug, Clone)]
pub struct LinkEvents {
    peer: PeerId,
    session: SessionId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl LinkEvents {
    pub fn new(peer: PeerId, session: SessionId, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { peer, session, tx }
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn state_changed(&self, state: LinkState) {
        self.emit(LinkEvent::State(state));
    }

    /// A local candidate was gathered and should be signaled to the peer.
    pub fn candidate(&self, candidate: Value) {
        self.emit(LinkEvent::LocalCandidate(candidate));
    }

    pub(crate) fn emit(&self, event: LinkEvent) {
        let event = SessionEvent::Link {
            peer: self.peer.clone(),
            session: self.session,
            event,
        };
        if self.tx.send(event).is_err() {
            debug!("Room of {} is gone, dropping link event", self.peer);
        }
    }
}

/// Creates direct links to peers.
#[async_trait]
pub trait LinkProvider: Send + Sync + 'static {
    async fn open(
        &self,
        peer: &PeerId,
        role: Role,
        events: LinkEvents,
    ) -> anyhow::Result<Box<dyn PeerLink>>;
}

/// One direct link. Descriptors and candidates are opaque JSON owned by the
/// implementation. Calls for a given link never overlap.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Produces and installs a local offer.
    async fn create_offer(&self) -> anyhow::Result<Value>;

    /// Applies a remote offer and returns the local answer.
    async fn accept_offer(&self, offer: Value) -> anyhow::Result<Value>;

    async fn apply_answer(&self, answer: Value) -> anyhow::Result<()>;

    /// Remote candidates may arrive before any remote description; the link
    /// buffers them itself.
    async fn add_candidate(&self, candidate: Value) -> anyhow::Result<()>;

    /// Abandons an outstanding local offer.
    async fn rollback(&self) -> anyhow::Result<()>;

    async fn close(&self) -> anyhow::Result<()>;
}
