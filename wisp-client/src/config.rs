use crate::transport::ReconnectPolicy;
use std::env;
use std::time::Duration;
use wisp_core::IceServerConfig;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay WebSocket endpoint, e.g. `ws://host:8080/ws`. `None` goes straight to the local bus.
    pub relay_url: Option<String>,
    /// Fall back to the in-process bus when the relay cannot be reached.
    pub local_fallback: bool,
    pub reconnect: ReconnectPolicy,
    /// Upper bound on each attempt to open the relay socket.
    pub connect_timeout: Duration,
    /// How long a transiently disconnected link may take to recover.
    pub grace_period: Duration,
    /// Ping interval of the local bus.
    pub presence_interval: Duration,
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            local_fallback: true,
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            grace_period: Duration::from_secs(5),
            presence_interval: Duration::from_secs(5),
            ice_servers: vec![
                IceServerConfig::stun("stun:stun.l.google.com:19302"),
                IceServerConfig::stun("stun:stun1.l.google.com:19302"),
            ],
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            relay_url: env::var("WISP_RELAY_URL")
                .ok()
                .filter(|url| !url.is_empty())
                .or(defaults.relay_url),
            grace_period: env::var("WISP_GRACE_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.grace_period),
            ..defaults
        }
    }

    pub fn with_relay(mut self, url: impl Into<String>) -> Self {
        self.relay_url = Some(url.into());
        self
    }
}
