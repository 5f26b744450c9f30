use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use wisp_core::{PeerId, RoomId};
use wisp_server::{RoomDirectory, SignalingService, serve_with_listener};

use crate::utils::TestClient;

pub struct TestServer {
    pub addr: SocketAddr,
    pub service: SignalingService,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("No local address");
        let service = SignalingService::new(RoomDirectory::new(100));

        let task = tokio::spawn({
            let service = service.clone();
            async move {
                let _ = serve_with_listener(listener, service).await;
            }
        });

        Self {
            addr,
            service,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Joins `room` as `user_id` and waits until the room has registered it,
    /// so consecutive joins in a test happen in a fixed order.
    pub async fn join(&self, room: &str, user_id: &str) -> TestClient {
        let client = TestClient::join(&self.url(), room, user_id).await;
        let room = RoomId::from(room);
        let peer = PeerId::from(user_id);

        for _ in 0..100 {
            let members = self.service.directory().members(&room).await;
            if members.iter().any(|m| m.user_id == peer) {
                return client;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{user_id} never registered in {room}");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
