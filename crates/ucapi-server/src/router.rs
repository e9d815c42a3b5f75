//! Entity subscription and command routing.
//!
//! The hub subscribes to entities from the `available` set; subscribed
//! entities are copied to the `configured` set, which is the only set
//! commands and state queries operate on.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use ucapi_core::{ClientId, Entities, StatusCode};

use crate::errors::RequestError;
use crate::events::{DriverEvent, DriverEvents};

pub struct EntityRouter {
    available: Arc<Entities>,
    configured: Arc<Entities>,
    events: DriverEvents,
}

impl EntityRouter {
    pub fn new(available: Arc<Entities>, configured: Arc<Entities>, events: DriverEvents) -> Self {
        Self {
            available,
            configured,
            events,
        }
    }

    /// Copy the given available entities to the configured set.
    ///
    /// Unknown ids are skipped. Returns the ids that are now configured.
    pub fn subscribe(&self, entity_ids: &[String]) -> Vec<String> {
        let mut processed = Vec::with_capacity(entity_ids.len());
        for entity_id in entity_ids {
            let Some(entity) = self.available.get(entity_id) else {
                tracing::warn!(entity_id, "Cannot subscribe to unknown entity");
                continue;
            };
            if !self.configured.contains(entity_id) {
                let _ = self.configured.add(entity);
            }
            processed.push(entity_id.clone());
        }
        self.events.emit(DriverEvent::SubscribeEntities(processed.clone()));
        processed
    }

    /// Remove the given entities from the configured set.
    ///
    /// Every present id is removed; returns `true` only if all were present.
    pub fn unsubscribe(&self, entity_ids: &[String]) -> bool {
        let mut all_present = true;
        let mut removed = Vec::with_capacity(entity_ids.len());
        for entity_id in entity_ids {
            if self.configured.remove(entity_id) {
                removed.push(entity_id.clone());
            } else {
                tracing::debug!(entity_id, "Cannot unsubscribe entity that is not configured");
                all_present = false;
            }
        }
        self.events.emit(DriverEvent::UnsubscribeEntities(removed));
        all_present
    }

    /// Route an entity command to its handler.
    ///
    /// Entities without a handler are reported as [`DriverEvent::EntityCommand`]
    /// and acknowledged with 200. A panicking handler is answered with 500.
    pub async fn dispatch_command(
        &self,
        client_id: &ClientId,
        entity_id: &str,
        cmd_id: &str,
        params: Option<Value>,
    ) -> Result<StatusCode, RequestError> {
        let entity = self.configured.get(entity_id).ok_or_else(|| {
            RequestError::not_found(format!("entity {entity_id} is not configured"))
        })?;

        if entity.has_command_handler() {
            let call = AssertUnwindSafe(entity.command(cmd_id, params.as_ref())).catch_unwind();
            let status = match call.await {
                Ok(status) => status.unwrap_or(StatusCode::ServerError),
                Err(_) => {
                    tracing::error!(entity_id, cmd_id, "Command handler panicked");
                    StatusCode::ServerError
                }
            };
            tracing::debug!(entity_id, cmd_id, code = status.as_u16(), "Entity command handled");
            return Ok(status);
        }

        self.events.emit(DriverEvent::EntityCommand {
            client_id: client_id.clone(),
            entity_id: entity_id.to_owned(),
            entity_type: entity.entity_type,
            cmd_id: cmd_id.to_owned(),
            params,
        });
        Ok(StatusCode::Ok)
    }
}
