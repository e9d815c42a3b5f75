//! Demo entities and setup logic.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use ucapi_core::{
    Attributes, CommandHandler, DriverError, Entities, Entity, EntityType, SetupAction,
    SetupHandler, SetupRequest, StatusCode,
};
use ucapi_server::IntegrationApi;

/// Turns lights on and off, reporting changes through the configured store.
pub struct LightControl {
    configured: Arc<Entities>,
}

#[async_trait]
impl CommandHandler for LightControl {
    async fn command(&self, entity: &Entity, cmd_id: &str, params: Option<&Value>) -> StatusCode {
        let mut attributes = Attributes::new();
        match cmd_id {
            "on" => {
                let _ = attributes.insert("state".into(), json!("ON"));
                if let Some(brightness) = params.and_then(|p| p.get("brightness")).and_then(Value::as_u64) {
                    if brightness > 255 {
                        return StatusCode::BadRequest;
                    }
                    let _ = attributes.insert("brightness".into(), json!(brightness));
                }
            }
            "off" => {
                let _ = attributes.insert("state".into(), json!("OFF"));
            }
            "toggle" => {
                let next = if entity.attributes.get("state") == Some(&json!("ON")) { "OFF" } else { "ON" };
                let _ = attributes.insert("state".into(), json!(next));
            }
            _ => return StatusCode::BadRequest,
        }
        if self.configured.update_attributes(&entity.id, attributes) {
            StatusCode::Ok
        } else {
            StatusCode::ServiceUnavailable
        }
    }
}

/// Logs button presses.
pub struct PushButton;

#[async_trait]
impl CommandHandler for PushButton {
    async fn command(&self, entity: &Entity, cmd_id: &str, _params: Option<&Value>) -> StatusCode {
        if cmd_id != "push" {
            return StatusCode::BadRequest;
        }
        tracing::info!(entity_id = %entity.id, "Button pushed");
        StatusCode::Ok
    }
}

pub fn register_entities(api: &IntegrationApi) {
    let configured = Arc::clone(api.configured_entities());
    let available = api.available_entities();
    let _ = available.add(
        Entity::new("light.living_room", EntityType::Light, "Living room")
            .with_features(["on_off", "toggle", "dim"])
            .with_attribute("state", json!("OFF"))
            .with_attribute("brightness", json!(0))
            .with_area("Living room")
            .with_command_handler(Arc::new(LightControl { configured })),
    );
    let _ = available.add(
        Entity::new("button.doorbell", EntityType::Button, "Doorbell")
            .with_attribute("state", json!("AVAILABLE"))
            .with_command_handler(Arc::new(PushButton)),
    );
}

/// Asks for the device address, then finishes.
pub struct PairingSetup;

#[async_trait]
impl SetupHandler for PairingSetup {
    async fn handle(&self, request: SetupRequest, _cancel: CancellationToken) -> Result<SetupAction, DriverError> {
        match request {
            SetupRequest::DriverSetup { .. } => Ok(SetupAction::RequestUserInput {
                title: "Device address".into(),
                settings: vec![json!({
                    "id": "address",
                    "label": {"en": "IP address"},
                    "field": {"text": {"value": ""}}
                })],
            }),
            SetupRequest::UserData { input_values } => {
                let address = input_values.get("address").and_then(Value::as_str).unwrap_or_default();
                if address.is_empty() {
                    return Err("no address entered".into());
                }
                tracing::info!(%address, "Device configured");
                Ok(SetupAction::Complete)
            }
            SetupRequest::UserConfirmation { confirm: true } => Ok(SetupAction::Complete),
            SetupRequest::UserConfirmation { confirm: false } => {
                Ok(SetupAction::Error(ucapi_core::IntegrationSetupError::Other))
            }
        }
    }
}
