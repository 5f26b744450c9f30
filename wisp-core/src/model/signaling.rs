use crate::model::peer::PeerId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Join,
    Leave,
    Offer,
    Answer,
    IceCandidate,
    ExistingPeers,
    Ping,
    /// Anything this build does not understand. Decoded so the rest of the
    /// envelope can be inspected, then ignored.
    #[serde(other)]
    Unknown,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
            Self::ExistingPeers => "existing-peers",
            Self::Ping => "ping",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-neutral signaling message.
///
/// `to` is only set for directed kinds; its absence means room-wide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEnvelope {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub from: PeerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<PeerId>,
    pub room_id: RoomId,
    #[serde(default)]
    pub data: Value,
}

impl SignalEnvelope {
    pub fn broadcast(kind: SignalKind, from: PeerId, room_id: RoomId, data: Value) -> Self {
        Self {
            kind,
            from,
            to: None,
            room_id,
            data,
        }
    }

    pub fn directed(
        kind: SignalKind,
        from: PeerId,
        to: PeerId,
        room_id: RoomId,
        data: Value,
    ) -> Self {
        Self {
            kind,
            from,
            to: Some(to),
            room_id,
            data,
        }
    }

    /// True when the envelope is addressed to someone other than `peer`.
    pub fn is_addressed_elsewhere(&self, peer: &PeerId) -> bool {
        self.to.as_ref().is_some_and(|to| to != peer)
    }
}
