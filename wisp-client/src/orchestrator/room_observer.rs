use crate::error::WispError;
use crate::session::{DepartureReason, SessionState};
use async_trait::async_trait;
use serde_json::Value;
use wisp_core::{PeerId, PeerRef, SignalKind};

/// Application hooks for one room. Called from the room's event loop, in
/// the order the events happened. A hook must not await a request on the
/// same room's [`RoomHandle`](crate::RoomHandle); spawn a task for that.
#[async_trait]
pub trait RoomObserver: Send + Sync + 'static {
    async fn on_peer_joined(&self, _peer: &PeerRef) {}

    async fn on_peer_left(&self, _peer: &PeerRef, _reason: DepartureReason) {}

    /// A handshake signal arrived from `from`.
    async fn on_signal(&self, _from: &PeerId, _kind: SignalKind, _data: &Value) {}

    async fn on_link_state_change(&self, _peer: &PeerId, _state: SessionState) {}

    /// The room ended without a local leave. Called at most once.
    async fn on_room_lost(&self, _error: &WispError) {}
}

pub struct NoopObserver;

impl RoomObserver for NoopObserver {}
