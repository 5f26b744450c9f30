use std::time::Duration;

use wisp_client::{ClientConfig, DepartureReason, LinkState, LocalBus, SessionState};
use wisp_core::PeerId;

use crate::integration::{TestPeer, init_tracing};
use crate::utils::Observed;

async fn connected_pair(bus: &LocalBus) -> (TestPeer, TestPeer) {
    let mut a = TestPeer::join(ClientConfig::default(), bus, "lobby", "a").await;
    let mut b = TestPeer::join(ClientConfig::default(), bus, "lobby", "b").await;
    a.events
        .wait_for(Observed::LinkState(PeerId::from("b"), SessionState::Connected))
        .await;
    b.events
        .wait_for(Observed::LinkState(PeerId::from("a"), SessionState::Connected))
        .await;
    (a, b)
}

#[tokio::test(start_paused = true)]
async fn test_link_recovers_within_grace_period() {
    init_tracing();
    let bus = LocalBus::new();
    let (mut a, _b) = connected_pair(&bus).await;
    let b_id = PeerId::from("b");

    a.links.emit("b", LinkState::Disconnected);
    a.events
        .wait_for(Observed::LinkState(b_id.clone(), SessionState::GraceDisconnected))
        .await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    a.links.emit("b", LinkState::Connected);
    a.events
        .wait_for(Observed::LinkState(b_id.clone(), SessionState::Connected))
        .await;

    // Well past the first deadline: the cancelled timer must not fire.
    tokio::time::sleep(Duration::from_secs(10)).await;
    let late = a.events.drain();
    assert!(
        !late.iter().any(|e| matches!(e, Observed::PeerLeft(..))),
        "{late:?}"
    );
    assert_eq!(
        a.handle.session_state(&b_id).await.expect("room is open"),
        Some(SessionState::Connected)
    );
}

#[tokio::test(start_paused = true)]
async fn test_grace_expiry_reports_departure_once() {
    init_tracing();
    let bus = LocalBus::new();
    let (mut a, _b) = connected_pair(&bus).await;
    let b_id = PeerId::from("b");

    a.links.emit("b", LinkState::Disconnected);
    a.events
        .wait_for(Observed::PeerLeft(b_id.clone(), DepartureReason::GraceExpired))
        .await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    let late = a.events.drain();
    assert!(
        !late.iter().any(|e| matches!(e, Observed::PeerLeft(..))),
        "{late:?}"
    );
    assert!(a.links.calls_for("b").contains(&"close".to_owned()));
    assert_eq!(a.handle.session_state(&b_id).await.expect("room is open"), None);
}
