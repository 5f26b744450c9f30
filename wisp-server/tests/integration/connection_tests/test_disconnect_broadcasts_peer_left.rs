use std::time::Duration;

use wisp_core::{PeerId, RoomId, ServerMessage};

use crate::integration::init_tracing;
use crate::utils::TestServer;

#[tokio::test]
async fn test_disconnect_broadcasts_peer_left() {
    init_tracing();
    let server = TestServer::start().await;

    let mut alice = server.join("room-1", "alice").await;
    let mut bob = server.join("room-1", "bob").await;
    assert!(matches!(bob.recv().await, ServerMessage::ExistingPeers { .. }));
    assert!(matches!(alice.recv().await, ServerMessage::PeerJoined { .. }));

    // Dropping the socket without a leave frame counts as leaving.
    bob.close().await;

    assert_eq!(
        alice.recv().await,
        ServerMessage::PeerLeft {
            user_id: PeerId::from("bob"),
        }
    );

    alice.close().await;

    let room = RoomId::from("room-1");
    for _ in 0..50 {
        if !server.service.directory().contains_room(&room) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Empty room was not removed");
}
