use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use wisp_core::ServerMessage;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Raw WebSocket client speaking the signaling wire protocol.
pub struct TestClient {
    pub user_id: String,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn connect(url: &str, user_id: &str) -> Self {
        let (ws, _) = connect_async(url)
            .await
            .expect("Failed to connect test client");
        Self {
            user_id: user_id.to_owned(),
            ws,
        }
    }

    /// Connects and sends a join frame for `room`.
    pub async fn join(url: &str, room: &str, user_id: &str) -> Self {
        let mut client = Self::connect(url, user_id).await;
        client
            .send_json(json!({
                "type": "join",
                "roomId": room,
                "userId": user_id,
                "username": format!("{user_id}-name"),
            }))
            .await;
        client
    }

    pub async fn send_json(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("Failed to send frame");
    }

    pub async fn signal(&mut self, to: &str, signal_type: &str, data: Value) {
        self.send_json(json!({
            "type": "signal",
            "to": to,
            "signalType": signal_type,
            "data": data,
        }))
        .await;
    }

    pub async fn recv(&mut self) -> ServerMessage {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .unwrap_or_else(|_| panic!("{} timed out waiting for a frame", self.user_id))
                .expect("Socket closed")
                .expect("Socket error");

            if let Message::Text(text) = frame {
                return serde_json::from_str(text.as_str()).expect("Invalid server frame");
            }
        }
    }

    /// Asserts nothing arrives within a short window.
    pub async fn expect_silence(&mut self) {
        let res = tokio::time::timeout(Duration::from_millis(150), self.ws.next()).await;
        assert!(res.is_err(), "{} got unexpected frame {:?}", self.user_id, res);
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
