use std::time::Duration;

use wisp_client::{ClientConfig, DepartureReason, LinkState, LocalBus, SessionState};
use wisp_core::PeerId;

use crate::integration::{TestPeer, init_tracing};
use crate::utils::Observed;

async fn wait_all_connected(peer: &TestPeer, count: usize) {
    for _ in 0..100 {
        let sessions = peer.handle.sessions().await.expect("room is open");
        if sessions.len() == count && sessions.iter().all(|s| s.state == SessionState::Connected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("links never came up");
}

#[tokio::test(start_paused = true)]
async fn test_link_failure_is_isolated() {
    init_tracing();
    let bus = LocalBus::new();
    let mut a = TestPeer::join(ClientConfig::default(), &bus, "lobby", "a").await;
    let _b = TestPeer::join(ClientConfig::default(), &bus, "lobby", "b").await;
    let _c = TestPeer::join(ClientConfig::default(), &bus, "lobby", "c").await;

    wait_all_connected(&a, 2).await;

    a.links.emit("b", LinkState::Failed);
    a.events
        .wait_for(Observed::PeerLeft(PeerId::from("b"), DepartureReason::LinkFailed))
        .await;

    let sessions = a.handle.sessions().await.expect("room is open");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].peer.id, PeerId::from("c"));
    assert_eq!(sessions[0].state, SessionState::Connected);
}
