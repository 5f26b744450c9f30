use std::env;
use std::net::{Ipv4Addr, SocketAddr};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Depth of each room's command queue.
    pub room_channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            room_channel_capacity: 100,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: env::var("WISP_BIND_ADDR")
                .ok()
                .and_then(|addr| addr.parse().ok())
                .unwrap_or(defaults.bind_addr),
            room_channel_capacity: env::var("WISP_ROOM_CAPACITY")
                .ok()
                .and_then(|cap| cap.parse().ok())
                .filter(|cap| *cap > 0)
                .unwrap_or(defaults.room_channel_capacity),
        }
    }
}
