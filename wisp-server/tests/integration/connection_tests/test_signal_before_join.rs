use serde_json::json;
use wisp_core::ServerMessage;

use crate::integration::init_tracing;
use crate::utils::{TestClient, TestServer};

#[tokio::test]
async fn test_signal_before_join() {
    init_tracing();
    let server = TestServer::start().await;

    let mut client = TestClient::connect(&server.url(), "early").await;
    client.send_json(json!("not an object")).await;
    client.signal("someone", "offer", json!({"sdp": "x"})).await;

    assert!(matches!(client.recv().await, ServerMessage::Error { .. }));

    client.close().await;
}
