//! Notifications from the server to driver code.

use serde_json::Value;
use tokio::sync::broadcast;
use ucapi_core::{ClientId, EntityType, SetupValues};

const DRIVER_EVENT_CAPACITY: usize = 256;

/// Something the driver may want to react to.
#[derive(Clone, Debug, PartialEq)]
pub enum DriverEvent {
    ClientConnected(ClientId),
    ClientDisconnected(ClientId),
    /// Hub asks the driver to connect to its devices.
    Connect,
    Disconnect,
    EnterStandby,
    ExitStandby,
    /// Entity ids that were moved to the configured set.
    SubscribeEntities(Vec<String>),
    /// Entity ids that were removed from the configured set.
    UnsubscribeEntities(Vec<String>),
    /// Command for an entity without a command handler (legacy drivers).
    EntityCommand {
        client_id: ClientId,
        entity_id: String,
        entity_type: EntityType,
        cmd_id: String,
        params: Option<Value>,
    },
    /// `setup_driver` without a setup handler (legacy drivers).
    SetupDriver {
        client_id: ClientId,
        reconfigure: bool,
        setup_data: SetupValues,
    },
    SetupDriverUserData {
        client_id: ClientId,
        input_values: SetupValues,
    },
    SetupDriverUserConfirmation {
        client_id: ClientId,
        confirm: bool,
    },
    SetupDriverAbort {
        client_id: ClientId,
    },
}

/// Broadcast channel of [`DriverEvent`]s.
#[derive(Clone)]
pub struct DriverEvents {
    tx: broadcast::Sender<DriverEvent>,
}

impl Default for DriverEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(DRIVER_EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Nobody listening is not an error.
    pub fn emit(&self, event: DriverEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No driver event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DriverEvent> {
        self.tx.subscribe()
    }
}
