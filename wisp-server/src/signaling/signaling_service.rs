use crate::room::{ConnectionId, Member, MemberHandle, RoomDirectory};
use tracing::{debug, error, info, warn};
use wisp_core::{ClientMessage, PeerId, RoomId, ServerMessage, SignalKind};

#[derive(Clone)]
pub struct SignalingService {
    directory: RoomDirectory,
}

impl SignalingService {
    pub fn new(directory: RoomDirectory) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    /// Starts tracking a new client connection whose outbound frames go to `handle`.
    pub fn connect(&self, handle: MemberHandle) -> ClientConnection {
        ClientConnection {
            id: ConnectionId::new(),
            handle,
            directory: self.directory.clone(),
            membership: None,
        }
    }
}

/// Server side of one client connection: remembers which room and identity
/// the client registered, and stamps that identity on everything it relays.
pub struct ClientConnection {
    id: ConnectionId,
    handle: MemberHandle,
    directory: RoomDirectory,
    membership: Option<(RoomId, PeerId)>,
}

impl ClientConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn membership(&self) -> Option<&(RoomId, PeerId)> {
        self.membership.as_ref()
    }

    pub async fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => self.handle_message(msg).await,
            Err(e) => warn!("Invalid ClientMessage on {:?}: {}", self.id, e),
        }
    }

    pub async fn handle_message(&mut self, msg: ClientMessage) {
        match msg {
            ClientMessage::Join {
                room_id,
                user_id,
                username,
            } => self.join(room_id, user_id, username).await,

            ClientMessage::Signal {
                to,
                signal_type,
                data,
            } => self.relay(Some(to), signal_type, data).await,

            ClientMessage::BroadcastSignal { signal_type, data } => {
                self.relay(None, signal_type, data).await
            }

            ClientMessage::Leave => self.disconnect().await,

            ClientMessage::Unknown => warn!("Unknown message type on {:?}", self.id),
        }
    }

    /// Deregisters the client from its room, if any.
    pub async fn disconnect(&mut self) {
        let Some((room_id, peer_id)) = self.membership.take() else {
            return;
        };
        info!("User {} leaving room {}", peer_id, room_id);
        self.directory.leave(&room_id, peer_id, self.id).await;
    }

    async fn join(&mut self, room_id: RoomId, user_id: PeerId, username: String) {
        if self.membership.is_some() {
            self.disconnect().await;
        }

        let member = Member {
            peer_id: user_id.clone(),
            username,
            connection: self.id,
            handle: self.handle.clone(),
        };

        match self.directory.join(&room_id, member).await {
            Ok(existing) => {
                debug!(
                    "User {} joined room {} with {} existing peers",
                    user_id,
                    room_id,
                    existing.len()
                );
                self.membership = Some((room_id, user_id));
            }
            Err(e) => {
                error!("Join of {} to room {} failed: {:?}", user_id, room_id, e);
                self.reply_error(format!("failed to join room {room_id}"));
            }
        }
    }

    async fn relay(&mut self, to: Option<PeerId>, kind: SignalKind, data: serde_json::Value) {
        let Some((room_id, from)) = self.membership.clone() else {
            self.reply_error("join a room before signaling".to_owned());
            return;
        };

        let Some(message) = ServerMessage::relayed(kind, from.clone(), data) else {
            self.reply_error(format!("signal type '{kind}' cannot be relayed"));
            return;
        };

        self.directory.route(&room_id, from, to, message).await;
    }

    fn reply_error(&self, message: String) {
        let _ = self.handle.send(ServerMessage::Error { message });
    }
}
