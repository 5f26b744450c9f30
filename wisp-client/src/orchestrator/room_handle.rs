use crate::error::{Result, WispError};
use crate::session::{OutboundSignal, SessionInfo, SessionState};
use crate::transport::TransportKind;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use wisp_core::{PeerId, PeerRef, RoomId, SignalKind};

/// Requests from a [`RoomHandle`] to its room loop.
#[derive(Debug)]
pub(crate) enum RoomControl {
    Send {
        signal: OutboundSignal,
        reply: oneshot::Sender<Result<()>>,
    },
    Renegotiate {
        peer: PeerId,
        reply: oneshot::Sender<Result<()>>,
    },
    Sessions {
        reply: oneshot::Sender<Vec<SessionInfo>>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
}

/// Membership in one room. Cheap to clone; every clone talks to the same
/// room loop. Once the room has ended all calls fail with
/// [`WispError::RoomClosed`], except [`leave`](Self::leave).
#[derive(Clone)]
pub struct RoomHandle {
    room: RoomId,
    local: PeerRef,
    transport: TransportKind,
    control: mpsc::Sender<RoomControl>,
}

impl RoomHandle {
    pub(crate) fn new(
        room: RoomId,
        local: PeerRef,
        transport: TransportKind,
        control: mpsc::Sender<RoomControl>,
    ) -> Self {
        Self {
            room,
            local,
            transport,
            control,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room
    }

    pub fn local_peer(&self) -> &PeerRef {
        &self.local
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport
    }

    /// Sends an application signal. `to: None` reaches the whole room.
    pub async fn send_signal(
        &self,
        to: Option<PeerId>,
        kind: SignalKind,
        data: Value,
    ) -> Result<()> {
        let signal = OutboundSignal { to, kind, data };
        self.request(|reply| RoomControl::Send { signal, reply })
            .await?
    }

    /// Starts a fresh offer/answer exchange on an established link.
    pub async fn renegotiate(&self, peer: &PeerId) -> Result<()> {
        let peer = peer.clone();
        self.request(|reply| RoomControl::Renegotiate { peer, reply })
            .await?
    }

    pub async fn sessions(&self) -> Result<Vec<SessionInfo>> {
        self.request(|reply| RoomControl::Sessions { reply }).await
    }

    pub async fn session_state(&self, peer: &PeerId) -> Result<Option<SessionState>> {
        let sessions = self.sessions().await?;
        Ok(sessions
            .into_iter()
            .find(|info| &info.peer.id == peer)
            .map(|info| info.state))
    }

    /// Closes every link, announces departure and stops the room loop.
    pub async fn leave(&self) -> Result<()> {
        match self.request(|reply| RoomControl::Leave { reply }).await {
            Ok(()) | Err(WispError::RoomClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }

    /// Completes once the room has ended, whether by leaving or by loss.
    pub async fn closed(&self) {
        self.control.closed().await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomControl,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.control
            .send(make(reply))
            .await
            .map_err(|_| WispError::RoomClosed)?;
        response.await.map_err(|_| WispError::RoomClosed)
    }
}
