use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;
use wisp_core::{PeerId, PeerSummary, ServerMessage};

/// Identifies one WebSocket connection, so a late close of a replaced
/// connection cannot evict the member that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Outbound queue of a connected member.
pub type MemberHandle = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug, Clone)]
pub struct Member {
    pub peer_id: PeerId,
    pub username: String,
    pub connection: ConnectionId,
    pub handle: MemberHandle,
}

impl Member {
    pub fn summary(&self) -> PeerSummary {
        PeerSummary {
            user_id: self.peer_id.clone(),
            username: self.username.clone(),
        }
    }
}

/// Commands delivered to a room actor by the directory.
#[derive(Debug)]
pub enum RoomCommand {
    /// Register a member; the reply carries the other live members.
    Join {
        member: Member,
        reply: oneshot::Sender<Vec<PeerSummary>>,
    },

    /// Deliver to `to` when present and registered, otherwise to everyone but `from`.
    Route {
        from: PeerId,
        to: Option<PeerId>,
        message: ServerMessage,
    },

    Leave {
        peer_id: PeerId,
        connection: ConnectionId,
    },

    Members {
        reply: oneshot::Sender<Vec<PeerSummary>>,
    },
}
