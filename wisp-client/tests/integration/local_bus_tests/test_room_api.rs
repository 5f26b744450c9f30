use std::time::Duration;

use serde_json::json;
use wisp_client::{ClientConfig, LocalBus, SessionState, WispError};
use wisp_core::{PeerId, SignalKind};

use crate::integration::{TestPeer, init_tracing};
use crate::utils::Observed;

#[tokio::test(start_paused = true)]
async fn test_signal_to_unknown_peer_is_rejected() {
    init_tracing();
    let bus = LocalBus::new();
    let a = TestPeer::join(ClientConfig::default(), &bus, "lobby", "a").await;

    let result = a
        .handle
        .send_signal(Some(PeerId::from("nobody")), SignalKind::Offer, json!({}))
        .await;
    assert!(matches!(result, Err(WispError::UnknownPeerTarget(p)) if p == PeerId::from("nobody")));

    let result = a.handle.renegotiate(&PeerId::from("nobody")).await;
    assert!(matches!(result, Err(WispError::UnknownPeerTarget(_))));
}

#[tokio::test(start_paused = true)]
async fn test_renegotiate_connected_peer() {
    init_tracing();
    let bus = LocalBus::new();
    let mut a = TestPeer::join(ClientConfig::default(), &bus, "lobby", "a").await;
    let mut b = TestPeer::join(ClientConfig::default(), &bus, "lobby", "b").await;
    a.events
        .wait_for(Observed::LinkState(PeerId::from("b"), SessionState::Connected))
        .await;
    b.events
        .wait_for(Observed::LinkState(PeerId::from("a"), SessionState::Connected))
        .await;

    // Either side may renegotiate, not only the initiator.
    a.handle
        .renegotiate(&PeerId::from("b"))
        .await
        .expect("renegotiation refused");
    b.events
        .wait_for(Observed::Signal(PeerId::from("a"), SignalKind::Offer))
        .await;
    a.events
        .wait_for(Observed::Signal(PeerId::from("b"), SignalKind::Answer))
        .await;

    let offers = a.links.calls_for("b");
    assert!(offers.contains(&"create_offer".to_owned()));
    assert_eq!(
        b.links
            .calls_for("a")
            .iter()
            .filter(|c| *c == "accept_offer")
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_closed_room_refuses_requests() {
    init_tracing();
    let bus = LocalBus::new();
    let a = TestPeer::join(ClientConfig::default(), &bus, "lobby", "a").await;

    a.handle.leave().await.expect("leave failed");
    a.handle.leave().await.expect("second leave is a no-op");

    assert!(matches!(a.handle.sessions().await, Err(WispError::RoomClosed)));
    assert!(matches!(
        a.handle.send_signal(None, SignalKind::Ping, json!({})).await,
        Err(WispError::RoomClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_closed_completes_when_room_ends() {
    init_tracing();
    let bus = LocalBus::new();
    let a = TestPeer::join(ClientConfig::default(), &bus, "lobby", "a").await;

    let waiter = tokio::spawn({
        let handle = a.handle.clone();
        async move { handle.closed().await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!waiter.is_finished());

    a.handle.leave().await.expect("leave failed");
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("closed() never completed")
        .expect("waiter panicked");
    assert!(a.handle.is_closed());
}
