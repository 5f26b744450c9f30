mod test_reconnect;
mod test_relay_handshake;

use std::time::Duration;

use wisp_client::{ClientConfig, ReconnectPolicy};

/// Relay config with backoff short enough for tests.
pub fn relay_config(url: &str) -> ClientConfig {
    ClientConfig {
        local_fallback: false,
        reconnect: ReconnectPolicy {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            max_attempts: 3,
        },
        ..ClientConfig::default()
    }
    .with_relay(url)
}
