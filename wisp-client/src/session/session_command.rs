use crate::session::{DepartureReason, Role, SessionId, SessionState, TimerId};
use serde_json::Value;
use std::time::Duration;
use wisp_core::{PeerId, PeerRef, SignalKind};

/// A signal the local peer wants delivered. `to: None` is a room-wide broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundSignal {
    pub to: Option<PeerId>,
    pub kind: SignalKind,
    pub data: Value,
}

impl OutboundSignal {
    pub fn directed(to: PeerId, kind: SignalKind, data: Value) -> Self {
        Self {
            to: Some(to),
            kind,
            data,
        }
    }

    pub fn broadcast(kind: SignalKind, data: Value) -> Self {
        Self {
            to: None,
            kind,
            data,
        }
    }
}

/// Operations executed in order against one peer's link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOp {
    CreateOffer,
    AcceptOffer(Value),
    ApplyAnswer(Value),
    AddCandidate(Value),
    Rollback,
}

/// Notifications surfaced to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    PeerJoined(PeerRef),
    PeerLeft {
        peer: PeerRef,
        reason: DepartureReason,
    },
    Signal {
        from: PeerId,
        kind: SignalKind,
        data: Value,
    },
    LinkStateChanged {
        peer: PeerId,
        state: SessionState,
    },
}

/// Side effects requested by the session manager. The manager never
/// performs I/O itself; its owner drains and executes these in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Open {
        peer: PeerId,
        session: SessionId,
        role: Role,
    },
    Link {
        peer: PeerId,
        session: SessionId,
        op: LinkOp,
    },
    Close {
        peer: PeerId,
        session: SessionId,
    },
    Send(OutboundSignal),
    ArmGraceTimer {
        peer: PeerId,
        timer: TimerId,
        after: Duration,
    },
    CancelGraceTimer {
        timer: TimerId,
    },
    Notify(RoomEvent),
}
