use wisp_client::{DepartureReason, LocalBus, Role, SessionState, TransportKind};
use wisp_core::{PeerId, SignalKind};

use crate::integration::relay_tests::relay_config;
use crate::integration::{TestPeer, init_tracing};
use crate::utils::{Observed, RelayServer};

#[tokio::test]
async fn test_relay_handshake() {
    init_tracing();
    let server = RelayServer::start().await;
    let bus = LocalBus::new();

    let mut b = TestPeer::join(relay_config(&server.url()), &bus, "room-1", "b").await;
    server.wait_for_member("room-1", "b").await;
    let mut a = TestPeer::join(relay_config(&server.url()), &bus, "room-1", "a").await;
    assert_eq!(a.handle.transport_kind(), TransportKind::Relay);

    // "a" learns about "b" from the existing-peers snapshot, "b" from peer-joined.
    a.events.wait_for(Observed::PeerJoined(PeerId::from("b"))).await;
    b.events.wait_for(Observed::PeerJoined(PeerId::from("a"))).await;

    a.events
        .wait_for(Observed::Signal(PeerId::from("b"), SignalKind::Offer))
        .await;
    b.events
        .wait_for(Observed::Signal(PeerId::from("a"), SignalKind::Answer))
        .await;
    b.events
        .wait_for(Observed::LinkState(PeerId::from("a"), SessionState::Connected))
        .await;

    let sessions = a.handle.sessions().await.expect("room is open");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].role, Role::Responder);
    assert_eq!(sessions[0].state, SessionState::Connected);
    assert_eq!(sessions[0].peer.display_name, "B");

    a.handle.leave().await.expect("leave failed");
    b.events
        .wait_for(Observed::PeerLeft(PeerId::from("a"), DepartureReason::Left))
        .await;
    b.handle.leave().await.expect("leave failed");
}
