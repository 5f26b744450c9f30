use crate::config::ClientConfig;
use crate::error::{Result, WispError};
use crate::session::OutboundSignal;
use crate::transport::{LocalBus, LocalBusTransport, RelayTransport};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};
use wisp_core::{PeerRef, RoomId, SignalEnvelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Relay,
    LocalBus,
}

#[derive(Debug)]
pub enum TransportEvent {
    Envelope(SignalEnvelope),
    /// The connection dropped and was re-established. Anything sent in the
    /// meantime is lost and fresh membership follows.
    Reconnected,
    /// The transport is gone for good; the room cannot continue.
    Lost(WispError),
}

/// Delivers signals between the members of one room. Inbound envelopes
/// arrive on the event channel given at connect time, already stripped of
/// the local peer's own messages.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn send(&self, signal: OutboundSignal) -> Result<()>;

    /// Announces departure and stops delivery.
    async fn close(&self) -> Result<()>;
}

/// Connects to the relay when one is configured, falling back to the local bus.
pub async fn connect_transport(
    config: &ClientConfig,
    bus: &LocalBus,
    room: &RoomId,
    local: &PeerRef,
    events: mpsc::Sender<TransportEvent>,
) -> Result<Box<dyn SignalingTransport>> {
    if let Some(url) = &config.relay_url {
        match RelayTransport::connect(
            url,
            room.clone(),
            local.clone(),
            config.reconnect.clone(),
            config.connect_timeout,
            events.clone(),
        )
        .await
        {
            Ok(relay) => return Ok(Box::new(relay)),
            Err(e) => warn!("Relay {} unavailable: {}", url, e),
        }
    }

    if !config.local_fallback {
        return Err(WispError::TransportUnavailable);
    }

    info!("Using local bus for room {}", room);
    let transport = LocalBusTransport::connect(
        bus,
        room.clone(),
        local.clone(),
        config.presence_interval,
        events,
    )?;
    Ok(Box::new(transport))
}
