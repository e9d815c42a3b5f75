//! Settings model.
//!
//! Every section uses `#[serde(default)]` so a settings file only needs the
//! keys it wants to change.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings of an integration driver.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntegrationSettings {
    pub server: ServerSettings,
    pub setup: SetupSettings,
    pub logging: LoggingSettings,
    pub driver: DriverSettings,
}

impl IntegrationSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(SettingsError::InvalidValue("server.port must not be 0".into()));
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if self.server.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalMs must not be 0".into(),
            ));
        }
        if self.server.client_timeout_ms <= self.server.heartbeat_interval_ms {
            return Err(SettingsError::InvalidValue(format!(
                "server.clientTimeoutMs ({}) must exceed heartbeatIntervalMs ({})",
                self.server.client_timeout_ms, self.server.heartbeat_interval_ms
            )));
        }
        Ok(())
    }
}

/// WebSocket server settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub interface: String,
    pub port: u16,
    /// WebSocket ping interval.
    pub heartbeat_interval_ms: u64,
    /// A client without a pong for this long is dropped.
    pub client_timeout_ms: u64,
    /// Outbound messages buffered per client before sends are dropped.
    pub send_queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            interface: "0.0.0.0".to_string(),
            port: 9090,
            heartbeat_interval_ms: 30_000,
            client_timeout_ms: 90_000,
            send_queue_capacity: 256,
        }
    }
}

/// Setup-flow settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetupSettings {
    /// Pause between acknowledging `set_driver_user_data` and running
    /// driver logic, giving the hub time to process the acknowledgement.
    pub settle_delay_ms: u64,
}

impl Default for SetupSettings {
    fn default() -> Self {
        Self { settle_delay_ms: 500 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverSettings {
    /// Path of the driver description file.
    pub metadata_path: String,
    /// Directory for driver configuration data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_home: Option<String>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            metadata_path: "driver.json".to_string(),
            config_home: None,
        }
    }
}
