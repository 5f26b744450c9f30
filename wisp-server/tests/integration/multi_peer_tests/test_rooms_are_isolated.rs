use serde_json::json;

use crate::integration::init_tracing;
use crate::utils::TestServer;

#[tokio::test]
async fn test_rooms_are_isolated() {
    init_tracing();
    let server = TestServer::start().await;

    let mut a = server.join("red", "a").await;
    let mut b = server.join("blue", "b").await;

    b.send_json(json!({
        "type": "broadcast-signal",
        "signalType": "offer",
        "data": {},
    }))
    .await;

    a.expect_silence().await;
    b.expect_silence().await;

    a.close().await;
    b.close().await;
}
