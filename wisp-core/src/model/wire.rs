use crate::model::peer::{PeerId, PeerSummary, unknown_username};
use crate::model::room::RoomId;
use crate::model::signaling::{SignalEnvelope, SignalKind};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Frames a client sends to the relay server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join {
        room_id: RoomId,
        user_id: PeerId,
        #[serde(default = "unknown_username")]
        username: String,
    },
    /// Directed signal; the server rewrites it to `{type: signal_type, from, data}`.
    Signal {
        to: PeerId,
        signal_type: SignalKind,
        #[serde(default)]
        data: Value,
    },
    BroadcastSignal {
        signal_type: SignalKind,
        #[serde(default)]
        data: Value,
    },
    Leave,
    #[serde(other)]
    Unknown,
}

/// Frames the relay server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    ExistingPeers {
        peers: Vec<PeerSummary>,
    },
    PeerJoined {
        user_id: PeerId,
        #[serde(default = "unknown_username")]
        username: String,
    },
    PeerLeft {
        user_id: PeerId,
    },
    Offer {
        from: PeerId,
        #[serde(default)]
        data: Value,
    },
    Answer {
        from: PeerId,
        #[serde(default)]
        data: Value,
    },
    IceCandidate {
        from: PeerId,
        #[serde(default)]
        data: Value,
    },
    Error {
        message: String,
    },
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Builds the relayed form of a client signal. Only handshake kinds are relayed.
    pub fn relayed(kind: SignalKind, from: PeerId, data: Value) -> Option<Self> {
        match kind {
            SignalKind::Offer => Some(Self::Offer { from, data }),
            SignalKind::Answer => Some(Self::Answer { from, data }),
            SignalKind::IceCandidate => Some(Self::IceCandidate { from, data }),
            _ => None,
        }
    }

    /// Maps a server frame onto the transport-neutral envelope.
    ///
    /// `local` is the receiving peer: relayed signals are addressed to it and
    /// `existing-peers` is attributed to it, since the directory has no peer id.
    pub fn into_envelope(self, room_id: &RoomId, local: &PeerId) -> Option<SignalEnvelope> {
        let room_id = room_id.clone();
        let envelope = match self {
            Self::ExistingPeers { peers } => SignalEnvelope::directed(
                SignalKind::ExistingPeers,
                local.clone(),
                local.clone(),
                room_id,
                json!({ "peers": peers }),
            ),
            Self::PeerJoined { user_id, username } => SignalEnvelope::broadcast(
                SignalKind::Join,
                user_id,
                room_id,
                json!({ "username": username }),
            ),
            Self::PeerLeft { user_id } => {
                SignalEnvelope::broadcast(SignalKind::Leave, user_id, room_id, Value::Null)
            }
            Self::Offer { from, data } => {
                SignalEnvelope::directed(SignalKind::Offer, from, local.clone(), room_id, data)
            }
            Self::Answer { from, data } => {
                SignalEnvelope::directed(SignalKind::Answer, from, local.clone(), room_id, data)
            }
            Self::IceCandidate { from, data } => SignalEnvelope::directed(
                SignalKind::IceCandidate,
                from,
                local.clone(),
                room_id,
                data,
            ),
            Self::Error { .. } | Self::Unknown => return None,
        };
        Some(envelope)
    }
}
