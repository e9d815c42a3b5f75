//! Driver description returned to the hub.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::text::LocalizedText;

/// Driver metadata as read from `driver.json`.
///
/// Only the identifying fields are typed; everything else in the file
/// (icon, developer, setup schema, ...) is kept verbatim and returned to the
/// hub unchanged by `get_driver_metadata`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverMetadata {
    pub driver_id: String,
    pub name: LocalizedText,
    pub version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DriverMetadata {
    pub fn new(driver_id: impl Into<String>, name: impl Into<LocalizedText>, version: impl Into<String>) -> Self {
        Self {
            driver_id: driver_id.into(),
            name: name.into(),
            version: version.into(),
            extra: Map::new(),
        }
    }

    /// Display name, English preferred.
    pub fn display_name(&self) -> &str {
        self.name
            .get("en")
            .or_else(|| self.name.first())
            .unwrap_or(&self.driver_id)
    }

    /// Payload of the `driver_version` response.
    pub fn version_info(&self, api: &str) -> DriverVersion {
        DriverVersion {
            name: self.display_name().to_owned(),
            version: VersionInfo {
                api: api.to_owned(),
                driver: self.version.clone(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub api: String,
    pub driver: String,
}

/// `{"name": ..., "version": {"api": ..., "driver": ...}}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverVersion {
    pub name: String,
    pub version: VersionInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_keeps_unknown_fields() {
        let raw = json!({
            "driver_id": "demo",
            "name": {"en": "Demo", "de": "Demo DE"},
            "version": "1.2.3",
            "icon": "uc:integration",
            "developer": {"name": "Someone"}
        });
        let meta: DriverMetadata = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(meta.driver_id, "demo");
        assert_eq!(meta.extra["icon"], "uc:integration");
        assert_eq!(serde_json::to_value(&meta).unwrap(), raw);
    }

    #[test]
    fn version_info_shape() {
        let meta = DriverMetadata::new("demo", "Demo driver", "0.4.0");
        let v = serde_json::to_value(meta.version_info("0.1.0")).unwrap();
        assert_eq!(v, json!({"name": "Demo driver", "version": {"api": "0.1.0", "driver": "0.4.0"}}));
    }

    #[test]
    fn display_name_falls_back() {
        let meta = DriverMetadata::new("demo", LocalizedText::default().with("de", "Nur Deutsch"), "1");
        assert_eq!(meta.display_name(), "Nur Deutsch");
        let meta = DriverMetadata::new("demo", LocalizedText::default(), "1");
        assert_eq!(meta.display_name(), "demo");
    }
}
