use wisp_core::{PeerId, PeerSummary, ServerMessage};

use crate::integration::init_tracing;
use crate::utils::TestServer;

#[tokio::test]
async fn test_join_receives_existing_peers() {
    init_tracing();
    let server = TestServer::start().await;

    let mut alice = server.join("room-1", "alice").await;
    // Lone joiner gets no existing-peers frame.
    alice.expect_silence().await;

    let mut bob = server.join("room-1", "bob").await;

    assert_eq!(
        bob.recv().await,
        ServerMessage::ExistingPeers {
            peers: vec![PeerSummary {
                user_id: PeerId::from("alice"),
                username: "alice-name".into(),
            }],
        }
    );
    assert_eq!(
        alice.recv().await,
        ServerMessage::PeerJoined {
            user_id: PeerId::from("bob"),
            username: "bob-name".into(),
        }
    );

    alice.close().await;
    bob.close().await;
}
