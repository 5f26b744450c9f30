use serde_json::json;
use wisp_core::{PeerId, ServerMessage};

use crate::integration::init_tracing;
use crate::utils::TestServer;

#[tokio::test]
async fn test_directed_signal_routing() {
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

    b.signal("a", "offer", json!({"type": "offer", "sdp": "v=0"})).await;
    a.signal("b", "answer", json!({"type": "answer", "sdp": "v=0"})).await;
    a.signal("b", "ice-candidate", json!({"candidate": "c1"})).await;

    assert_eq!(
        a.recv().await,
        ServerMessage::Offer {
            from: PeerId::from("b"),
            data: json!({"type": "offer", "sdp": "v=0"}),
        }
    );
    assert_eq!(
        b.recv().await,
        ServerMessage::Answer {
            from: PeerId::from("a"),
            data: json!({"type": "answer", "sdp": "v=0"}),
        }
    );
    assert_eq!(
        b.recv().await,
        ServerMessage::IceCandidate {
            from: PeerId::from("a"),
            data: json!({"candidate": "c1"}),
        }
    );
    c.expect_silence().await;

    a.close().await;
    b.close().await;
    c.close().await;
}
