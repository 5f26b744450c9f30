use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;
use wisp_core::PeerId;

#[derive(Debug, Error)]
pub enum WispError {
    #[error("no signaling transport could be established")]
    TransportUnavailable,

    #[error("relay did not answer within {0:?}")]
    ConnectTimeout(Duration),

    #[error("relay unreachable after {attempts} reconnect attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),

    #[error("peer {0} is not part of the room")]
    UnknownPeerTarget(PeerId),

    #[error("renegotiation with {peer} rejected: {reason}")]
    RenegotiationRejected { peer: PeerId, reason: &'static str },

    #[error("room is closed")]
    RoomClosed,

    #[error("link provider error: {0:#}")]
    Link(#[from] anyhow::Error),

    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),
}

impl From<tungstenite::Error> for WispError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, WispError>;
