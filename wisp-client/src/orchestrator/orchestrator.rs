use crate::config::ClientConfig;
use crate::error::Result;
use crate::link::LinkProvider;
use crate::orchestrator::room_loop::RoomLoop;
use crate::orchestrator::{RoomHandle, RoomObserver};
use crate::transport::{LocalBus, connect_transport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use wisp_core::{PeerId, PeerRef, RoomId};

const TRANSPORT_EVENT_CAPACITY: usize = 256;
const CONTROL_CAPACITY: usize = 32;

/// Entry point of the client: joins rooms and keeps a direct link to every
/// other member of each.
pub struct Orchestrator {
    config: ClientConfig,
    provider: Arc<dyn LinkProvider>,
    observer: Arc<dyn RoomObserver>,
    bus: LocalBus,
}

impl Orchestrator {
    pub fn new(
        config: ClientConfig,
        provider: Arc<dyn LinkProvider>,
        observer: Arc<dyn RoomObserver>,
    ) -> Self {
        Self {
            config,
            provider,
            observer,
            bus: LocalBus::new(),
        }
    }

    /// Shares a bus with other orchestrators in the same process, so they
    /// can find each other without a relay.
    pub fn with_local_bus(mut self, bus: LocalBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn local_bus(&self) -> &LocalBus {
        &self.bus
    }

    /// Joins `room` under a freshly generated peer id.
    pub async fn join_room(
        &self,
        room: RoomId,
        display_name: impl Into<String>,
    ) -> Result<RoomHandle> {
        self.join_room_as(room, PeerRef::new(PeerId::generate(), display_name))
            .await
    }

    pub async fn join_room_as(&self, room: RoomId, local: PeerRef) -> Result<RoomHandle> {
        let (events_tx, events_rx) = mpsc::channel(TRANSPORT_EVENT_CAPACITY);
        let transport = connect_transport(&self.config, &self.bus, &room, &local, events_tx).await?;
        let kind = transport.kind();

        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let room_loop = RoomLoop::new(
            room.clone(),
            local.id.clone(),
            self.config.grace_period,
            transport,
            self.provider.clone(),
            self.observer.clone(),
            control_rx,
            events_rx,
        );
        tokio::spawn(room_loop.run());

        info!("Joined room {} as {} over {:?}", room, local.id, kind);
        Ok(RoomHandle::new(room, local, kind, control_tx))
    }
}
