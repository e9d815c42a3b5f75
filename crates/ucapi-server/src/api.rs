//! Driver-facing handle to the integration server.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use ucapi_core::{
    ClientId, DeviceState, DriverMetadata, DriverVersion, Entities, Envelope, EventCategory,
    EventMessage, SetupAction, SetupHandler, API_VERSION,
};

use crate::client::ClientRegistry;
use crate::config::ServerConfig;
use crate::events::{DriverEvent, DriverEvents};
use crate::router::EntityRouter;
use crate::setup::SetupFlows;

/// Everything a driver interacts with: entity sets, device state, setup
/// flows and driver notifications.
///
/// Built once, wrapped in an `Arc` and shared with [`crate::start`].
pub struct IntegrationApi {
    metadata: DriverMetadata,
    registry: Arc<ClientRegistry>,
    available: Arc<Entities>,
    configured: Arc<Entities>,
    router: EntityRouter,
    setup: SetupFlows,
    events: DriverEvents,
    device_state: RwLock<DeviceState>,
}

impl IntegrationApi {
    pub fn new(metadata: DriverMetadata, config: &ServerConfig) -> Self {
        let registry = Arc::new(ClientRegistry::new(config.max_send_queue, config.client_timeout));
        let available = Arc::new(Entities::new("available"));
        let configured = Arc::new(Entities::new("configured"));
        let events = DriverEvents::new();
        let router = EntityRouter::new(Arc::clone(&available), Arc::clone(&configured), events.clone());
        let setup = SetupFlows::new(Arc::clone(&registry), events.clone(), config.setup_settle_delay);

        Self {
            metadata,
            registry,
            available,
            configured,
            router,
            setup,
            events,
            device_state: RwLock::new(DeviceState::default()),
        }
    }

    #[must_use]
    pub fn with_setup_handler(self, handler: Arc<dyn SetupHandler>) -> Self {
        self.setup.set_handler(handler);
        self
    }

    pub fn set_setup_handler(&self, handler: Arc<dyn SetupHandler>) {
        self.setup.set_handler(handler);
    }

    pub fn metadata(&self) -> &DriverMetadata {
        &self.metadata
    }

    pub fn driver_version(&self) -> DriverVersion {
        self.metadata.version_info(API_VERSION)
    }

    /// Entities the driver can provide.
    pub fn available_entities(&self) -> &Arc<Entities> {
        &self.available
    }

    /// Entities the hub subscribed to. Attribute updates here are pushed to
    /// every connected hub.
    pub fn configured_entities(&self) -> &Arc<Entities> {
        &self.configured
    }

    pub fn device_state(&self) -> DeviceState {
        *self.device_state.read()
    }

    /// Update the device state, broadcasting it if it changed.
    pub fn set_device_state(&self, state: DeviceState) -> bool {
        {
            let mut current = self.device_state.write();
            if *current == state {
                return false;
            }
            *current = state;
        }
        tracing::info!(?state, "Device state changed");
        let _ = self.broadcast_event(EventMessage::DeviceState, json!({ "state": state }), EventCategory::Device);
        true
    }

    /// Send an event to every connected hub. Returns the number reached.
    pub fn broadcast_event(&self, msg: EventMessage, msg_data: Value, cat: EventCategory) -> usize {
        self.registry.broadcast(&Envelope::event(msg, msg_data, cat))
    }

    pub fn subscribe_driver_events(&self) -> broadcast::Receiver<DriverEvent> {
        self.events.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.registry.count()
    }

    /// Progress event for a legacy setup flow.
    pub fn send_setup_progress(&self, client_id: &ClientId) {
        self.setup.send_progress(client_id);
    }

    /// Next step of a legacy setup flow (no [`SetupHandler`] installed).
    pub fn send_setup_action(&self, client_id: &ClientId, action: SetupAction) {
        self.setup.apply_action(client_id, action);
    }

    pub(crate) fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub(crate) fn router(&self) -> &EntityRouter {
        &self.router
    }

    pub(crate) fn setup(&self) -> &SetupFlows {
        &self.setup
    }

    pub(crate) fn events(&self) -> &DriverEvents {
        &self.events
    }

    /// Register a new hub session.
    pub(crate) fn client_connected(&self, peer: SocketAddr) -> (ClientId, mpsc::Receiver<String>) {
        let (client_id, rx) = self.registry.register(peer);
        tracing::info!(client_id = %client_id, "Client connected");
        self.events.emit(DriverEvent::ClientConnected(client_id.clone()));
        (client_id, rx)
    }

    /// Tear down a hub session and abandon its setup flow.
    pub(crate) fn client_disconnected(&self, client_id: &ClientId) {
        let _ = self.registry.unregister(client_id);
        let _ = self.setup.abort(client_id);
        tracing::info!(client_id = %client_id, "Client disconnected");
        self.events.emit(DriverEvent::ClientDisconnected(client_id.clone()));
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;

    pub fn metadata() -> DriverMetadata {
        DriverMetadata::new("test_driver", "Test driver", "1.2.3")
    }

    pub fn api() -> IntegrationApi {
        IntegrationApi::new(metadata(), &ServerConfig::default())
    }

    pub fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([192, 168, 1, 20], port))
    }

    /// Connect a client and drop its authentication message.
    pub fn connect(api: &IntegrationApi, port: u16) -> (ClientId, mpsc::Receiver<String>) {
        let (id, mut rx) = api.client_connected(peer(port));
        let _ = rx.try_recv();
        (id, rx)
    }

    pub fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(text) = rx.try_recv() {
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }
}
