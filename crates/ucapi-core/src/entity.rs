//! Entities exposed by a driver.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::StatusCode;
use crate::text::LocalizedText;

/// Entity attribute map. Keys are kept sorted so serialized attributes are
/// stable across updates.
pub type Attributes = serde_json::Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Button,
    Climate,
    Cover,
    IrEmitter,
    Light,
    MediaPlayer,
    Remote,
    Select,
    Sensor,
    Switch,
    VoiceAssistant,
}

/// Driver logic executing entity commands.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Execute `cmd_id` on `entity`. The returned status is sent to the hub
    /// as the command acknowledgement.
    async fn command(&self, entity: &Entity, cmd_id: &str, params: Option<&Value>) -> StatusCode;
}

/// A controllable entity.
#[derive(Clone)]
pub struct Entity {
    pub id: String,
    pub entity_type: EntityType,
    pub name: LocalizedText,
    pub features: Vec<String>,
    pub attributes: Attributes,
    pub device_id: Option<String>,
    pub device_class: Option<String>,
    pub options: Option<Value>,
    pub area: Option<String>,
    cmd_handler: Option<Arc<dyn CommandHandler>>,
}

impl Entity {
    pub fn new(id: impl Into<String>, entity_type: EntityType, name: impl Into<LocalizedText>) -> Self {
        Self {
            id: id.into(),
            entity_type,
            name: name.into(),
            features: Vec::new(),
            attributes: Attributes::new(),
            device_id: None,
            device_class: None,
            options: None,
            area: None,
            cmd_handler: None,
        }
    }

    #[must_use]
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        let _ = self.attributes.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    #[must_use]
    pub fn with_device_class(mut self, device_class: impl Into<String>) -> Self {
        self.device_class = Some(device_class.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    #[must_use]
    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    #[must_use]
    pub fn with_command_handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.cmd_handler = Some(handler);
        self
    }

    pub fn has_command_handler(&self) -> bool {
        self.cmd_handler.is_some()
    }

    /// Run the registered command handler.
    ///
    /// Returns `None` when the entity has no handler; callers fall back to
    /// notifying the driver instead.
    pub async fn command(&self, cmd_id: &str, params: Option<&Value>) -> Option<StatusCode> {
        let handler = self.cmd_handler.as_ref()?;
        Some(handler.command(self, cmd_id, params).await)
    }

    /// Descriptor sent in `available_entities`.
    pub fn descriptor(&self) -> EntityDescriptor {
        EntityDescriptor {
            entity_id: self.id.clone(),
            entity_type: self.entity_type,
            device_id: self.device_id.clone(),
            features: self.features.clone(),
            name: self.name.clone(),
            area: self.area.clone(),
            device_class: self.device_class.clone(),
            options: self.options.clone(),
        }
    }

    /// State snapshot sent in `entity_states`.
    pub fn state(&self) -> EntityState {
        EntityState {
            entity_id: self.id.clone(),
            entity_type: self.entity_type,
            device_id: self.device_id.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("entity_type", &self.entity_type)
            .field("features", &self.features)
            .field("attributes", &self.attributes)
            .field("has_cmd_handler", &self.has_command_handler())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub entity_id: String,
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub features: Vec<String>,
    pub name: LocalizedText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub attributes: Attributes,
}
