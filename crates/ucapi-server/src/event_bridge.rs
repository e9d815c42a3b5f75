use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::broadcast;
use ucapi_core::{EntityChange, Envelope, EventCategory, EventMessage};

use crate::client::ClientRegistry;

/// Forwards attribute changes of the configured entity set to every
/// connected client as `entity_change` events.
pub struct EventBridge {
    registry: Arc<ClientRegistry>,
}

impl EventBridge {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    pub fn start(&self, mut rx: broadcast::Receiver<EntityChange>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => {
                        let _ = registry.broadcast(&entity_change_event(change));
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Event bridge lagged, dropped entity changes");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bridge channel closed");
                        break;
                    }
                }
            }
        })
    }
}

/// Create an event bridge wired to an entity change channel.
pub fn create_bridge(
    registry: Arc<ClientRegistry>,
    rx: broadcast::Receiver<EntityChange>,
) -> tokio::task::JoinHandle<()> {
    EventBridge::new(registry).start(rx)
}

/// `{"entity_id", "entity_type", "attributes"}` with attributes key-sorted.
pub fn entity_change_event(change: EntityChange) -> Envelope {
    let mut data = Map::new();
    let _ = data.insert("entity_id".into(), Value::String(change.entity_id));
    let _ = data.insert(
        "entity_type".into(),
        serde_json::to_value(change.entity_type).unwrap_or(Value::Null),
    );
    let _ = data.insert("attributes".into(), Value::Object(change.attributes));
    Envelope::event(EventMessage::EntityChange, Value::Object(data), EventCategory::Entity)
}
