use serde_json::json;
use wisp_core::{PeerId, ServerMessage};

use crate::integration::init_tracing;
use crate::utils::TestServer;

#[tokio::test]
async fn test_peer_leaves_others_stay() {
    init_tracing();
    let server = TestServer::start().await;

    let mut a = server.join("room-1", "a").await;
    let mut b = server.join("room-1", "b").await;
    let mut c = server.join("room-1", "c").await;
    assert!(matches!(b.recv().await, ServerMessage::ExistingPeers { .. }));
    assert!(matches!(c.recv().await, ServerMessage::ExistingPeers { .. }));
    assert!(matches!(a.recv().await, ServerMessage::PeerJoined { .. }));
    assert!(matches!(a.recv().await, ServerMessage::PeerJoined { .. }));
    assert!(matches!(b.recv().await, ServerMessage::PeerJoined { .. }));

    b.send_json(json!({"type": "leave"})).await;

    let left = ServerMessage::PeerLeft {
        user_id: PeerId::from("b"),
    };
    assert_eq!(a.recv().await, left);
    assert_eq!(c.recv().await, left);

    // The remaining pair still signals.
    c.signal("a", "offer", json!({"sdp": "after"})).await;
    assert_eq!(
        a.recv().await,
        ServerMessage::Offer {
            from: PeerId::from("c"),
            data: json!({"sdp": "after"}),
        }
    );

    a.close().await;
    b.close().await;
    c.close().await;
}
