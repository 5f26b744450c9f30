mod peer;
mod room;
mod signaling;
mod wire;

pub use peer::{PeerId, PeerRef, PeerSummary, now_ms};
pub use room::RoomId;
pub use signaling::{IceServerConfig, SignalEnvelope, SignalKind};
pub use wire::{ClientMessage, ServerMessage};
