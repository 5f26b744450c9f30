pub mod lifecycle_tests;
pub mod relay_tests;

use std::sync::Arc;

use tracing::Level;
use wisp_client::{ClientConfig, LocalBus, Orchestrator, RoomHandle};
use wisp_core::{PeerId, PeerRef, RoomId};

use crate::utils::{MockLinkProvider, ObservedEvents, RecordingObserver};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// One participant of a test room with its own link provider and observer.
pub struct TestPeer {
    pub handle: RoomHandle,
    pub links: MockLinkProvider,
    pub events: ObservedEvents,
}

impl TestPeer {
    pub async fn join(config: ClientConfig, bus: &LocalBus, room: &str, id: &str) -> Self {
        let links = MockLinkProvider::new();
        let (observer, events) = RecordingObserver::new();
        let orchestrator = Orchestrator::new(config, Arc::new(links.clone()), observer)
            .with_local_bus(bus.clone());

        let local = PeerRef::new(PeerId::from(id), id.to_uppercase());
        let handle = orchestrator
            .join_room_as(RoomId::from(room), local)
            .await
            .expect("join failed");

        Self {
            handle,
            links,
            events,
        }
    }
}
