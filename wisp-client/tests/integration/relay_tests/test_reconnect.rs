use futures::SinkExt;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use wisp_client::{DepartureReason, LocalBus, SessionState, WispError};
use wisp_core::PeerId;

use crate::integration::relay_tests::relay_config;
use crate::integration::{TestPeer, init_tracing};
use crate::utils::{Observed, accept_joined, next_signal, send_frame};

#[tokio::test]
async fn test_reconnect_rejoins_room() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let url = format!("ws://{}/ws", listener.local_addr().expect("no address"));

    let mut a = TestPeer::join(relay_config(&url), &LocalBus::new(), "room-1", "a").await;
    let (first, join) = accept_joined(&listener).await;
    assert_eq!(join["userId"], "a");
    assert_eq!(join["roomId"], "room-1");
    drop(first);

    // The client comes back on its own and registers again.
    let (mut second, join) = accept_joined(&listener).await;
    assert_eq!(join["userId"], "a");
    assert_eq!(join["username"], "A");

    let peer_joined = json!({"type": "peer-joined", "userId": "z", "username": "Zed"});
    second
        .send(Message::Text(peer_joined.to_string().into()))
        .await
        .expect("send failed");
    a.events.wait_for(Observed::PeerJoined(PeerId::from("z"))).await;
    assert!(!a.handle.is_closed());
}

#[tokio::test]
async fn test_reconnect_exhaustion_loses_room() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let url = format!("ws://{}/ws", listener.local_addr().expect("no address"));

    let mut a = TestPeer::join(relay_config(&url), &LocalBus::new(), "room-1", "a").await;
    let (mut ws, _) = accept_joined(&listener).await;

    let peer_joined = json!({"type": "peer-joined", "userId": "z", "username": "Zed"});
    ws.send(Message::Text(peer_joined.to_string().into()))
        .await
        .expect("send failed");
    a.events.wait_for(Observed::PeerJoined(PeerId::from("z"))).await;

    // Server gone for good: every retry is refused.
    drop(ws);
    drop(listener);

    let expected = WispError::ReconnectExhausted { attempts: 3 }.to_string();
    a.events.wait_for(Observed::RoomLost(expected)).await;

    tokio::time::timeout(std::time::Duration::from_secs(5), a.handle.closed())
        .await
        .expect("room never closed");
    for _ in 0..50 {
        if a.links.calls_for("z").contains(&"close".to_owned()) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(a.links.calls_for("z").contains(&"close".to_owned()));
    assert!(matches!(a.handle.sessions().await, Err(WispError::RoomClosed)));
    assert!(a.events.drain().iter().all(|e| !matches!(e, Observed::RoomLost(_))));
}

#[tokio::test]
async fn test_reconnect_restarts_connected_sessions() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let url = format!("ws://{}/ws", listener.local_addr().expect("no address"));
    let b = PeerId::from("b");

    // "m" sorts after "b", so the client initiates.
    let mut m = TestPeer::join(relay_config(&url), &LocalBus::new(), "room-1", "m").await;
    let (mut first, _) = accept_joined(&listener).await;
    send_frame(
        &mut first,
        json!({"type": "peer-joined", "userId": "b", "username": "Bea"}),
    )
    .await;
    let offer = next_signal(&mut first, "offer").await;
    assert_eq!(offer["to"], "b");
    send_frame(
        &mut first,
        json!({"type": "answer", "from": "b", "data": {"type": "answer", "sdp": "v=0"}}),
    )
    .await;
    m.events
        .wait_for(Observed::LinkState(b.clone(), SessionState::Connected))
        .await;
    drop(first);

    // While the client was away the directory saw it leave and return, so
    // "b" starts over and expects a fresh offer.
    let (mut second, join) = accept_joined(&listener).await;
    assert_eq!(join["userId"], "m");
    send_frame(
        &mut second,
        json!({"type": "existing-peers", "peers": [{"userId": "b", "username": "Bea"}]}),
    )
    .await;

    m.events
        .wait_for(Observed::PeerLeft(
            b.clone(),
            DepartureReason::SignalingInterrupted,
        ))
        .await;
    let offer = next_signal(&mut second, "offer").await;
    assert_eq!(offer["to"], "b");

    let calls = m.links.calls_for("b");
    assert_eq!(calls.iter().filter(|c| c.as_str() == "open as Initiator").count(), 2);
    assert_eq!(calls.iter().filter(|c| c.as_str() == "create_offer").count(), 2);
    assert!(!m.handle.is_closed());
}
