//! Driver device state.

use serde::{Deserialize, Serialize};

/// Process-wide state of the driver's connection to its device(s).
///
/// Changed only through `IntegrationApi::set_device_state`, which broadcasts
/// the new value to every connected hub.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    Connected,
    Connecting,
    #[default]
    Disconnected,
    Error,
}
