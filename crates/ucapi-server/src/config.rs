use std::time::Duration;

use ucapi_settings::IntegrationSettings;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub interface: String,
    /// Port to bind; 0 picks a free port.
    pub port: u16,
    pub max_send_queue: usize,
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
    pub cleanup_interval: Duration,
    /// Pause after acknowledging `set_driver_user_data`.
    pub setup_settle_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            interface: "0.0.0.0".to_string(),
            port: 9090,
            max_send_queue: 256,
            heartbeat_interval: Duration::from_secs(30),
            client_timeout: Duration::from_secs(90),
            cleanup_interval: Duration::from_secs(60),
            setup_settle_delay: Duration::from_millis(500),
        }
    }
}

impl From<&IntegrationSettings> for ServerConfig {
    fn from(settings: &IntegrationSettings) -> Self {
        let server = &settings.server;
        Self {
            interface: server.interface.clone(),
            port: server.port,
            max_send_queue: server.send_queue_capacity,
            heartbeat_interval: Duration::from_millis(server.heartbeat_interval_ms),
            client_timeout: Duration::from_millis(server.client_timeout_ms),
            // Sweep at the heartbeat cadence, but not more often than once a second.
            cleanup_interval: Duration::from_millis(server.heartbeat_interval_ms.max(1_000)),
            setup_settle_delay: Duration::from_millis(settings.setup.settle_delay_ms),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.interface, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_settings() {
        let mut settings = IntegrationSettings::default();
        settings.server.port = 8123;
        settings.server.interface = "127.0.0.1".into();
        settings.setup.settle_delay_ms = 10;

        let config = ServerConfig::from(&settings);
        assert_eq!(config.bind_addr(), "127.0.0.1:8123");
        assert_eq!(config.setup_settle_delay, Duration::from_millis(10));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.client_timeout, Duration::from_secs(90));
        assert_eq!(config.max_send_queue, 256);
    }

    #[test]
    fn default_matches_settings_defaults() {
        let from_settings = ServerConfig::from(&IntegrationSettings::default());
        let default = ServerConfig::default();
        assert_eq!(from_settings.port, default.port);
        assert_eq!(from_settings.setup_settle_delay, default.setup_settle_delay);
        assert_eq!(from_settings.client_timeout, default.client_timeout);
    }
}
