//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`IntegrationSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `UC_*` environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules: objects merge per key, arrays and primitives are
//! replaced, nulls in the file are skipped.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};
use ucapi_core::DriverMetadata;

use crate::errors::{Result, SettingsError};
use crate::types::IntegrationSettings;

pub const ENV_INTERFACE: &str = "UC_INTEGRATION_INTERFACE";
pub const ENV_HTTP_PORT: &str = "UC_INTEGRATION_HTTP_PORT";
pub const ENV_CONFIG_HOME: &str = "UC_CONFIG_HOME";
pub const ENV_LOG_LEVEL: &str = "UC_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "UC_LOG_JSON";

/// Directory holding driver configuration: `UC_CONFIG_HOME` or the working
/// directory.
pub fn config_home() -> PathBuf {
    read_env_string(ENV_CONFIG_HOME).map_or_else(|| PathBuf::from("."), PathBuf::from)
}

/// Default settings file location, `<config home>/settings.json`.
pub fn settings_path() -> PathBuf {
    config_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<IntegrationSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<IntegrationSettings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

/// Like [`load_settings_from_path`], reading overrides through `lookup`
/// instead of the process environment.
pub fn load_settings_with<F>(path: &Path, lookup: F) -> Result<IntegrationSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(IntegrationSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: IntegrationSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, lookup);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides. Invalid values are logged and
/// ignored.
pub fn apply_env_overrides(settings: &mut IntegrationSettings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

fn apply_overrides<F>(settings: &mut IntegrationSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(v) = string(ENV_INTERFACE) {
        settings.server.interface = v;
    }
    if let Some(v) = string(ENV_HTTP_PORT) {
        match parse_u16_range(&v, 1, 65535) {
            Some(port) => settings.server.port = port,
            None => warn!(key = ENV_HTTP_PORT, value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = string(ENV_CONFIG_HOME) {
        settings.driver.config_home = Some(v);
    }
    if let Some(v) = string(ENV_LOG_LEVEL) {
        settings.logging.level = v;
    }
    if let Some(v) = string(ENV_LOG_JSON) {
        match parse_bool(&v) {
            Some(json) => settings.logging.json = json,
            None => warn!(key = ENV_LOG_JSON, value = %v, "invalid boolean env var, ignoring"),
        }
    }
}

/// Load the driver description (`driver.json`).
pub fn load_driver_metadata(path: &Path) -> Result<DriverMetadata> {
    debug!(?path, "loading driver metadata");
    let content = std::fs::read_to_string(path)?;
    let metadata: DriverMetadata = serde_json::from_str(&content)?;
    if metadata.driver_id.trim().is_empty() {
        return Err(SettingsError::InvalidMetadata {
            path: path.to_path_buf(),
            reason: "driver_id is empty".into(),
        });
    }
    Ok(metadata)
}

/// Accepts (case-insensitive) `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn write(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("settings.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "interface": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 9091}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9091);
        assert_eq!(merged["server"]["interface"], "0.0.0.0");
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_array_replaces() {
        let merged = deep_merge(serde_json::json!({"a": [1, 2]}), serde_json::json!({"a": [3]}));
        assert_eq!(merged["a"], serde_json::json!([3]));
    }

    #[test]
    fn missing_file_returns_defaults() {
        let settings = load_settings_with(Path::new("/nonexistent/settings.json"), no_env).unwrap();
        assert_eq!(settings, IntegrationSettings::default());
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, r#"{"server": {"port": 9999}, "setup": {"settleDelayMs": 20}}"#);
        let settings = load_settings_with(&path, no_env).unwrap();
        assert_eq!(settings.server.port, 9999);
        assert_eq!(settings.server.interface, "0.0.0.0");
        assert_eq!(settings.setup.settle_delay_ms, 20);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "not json");
        let err = load_settings_with(&path, no_env).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, r#"{"server": {"sendQueueCapacity": 0}}"#);
        let err = load_settings_with(&path, no_env).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, r#"{"server": {"port": 9999}, "logging": {"level": "warn"}}"#);
        let lookup = env(&[
            (ENV_HTTP_PORT, "8088"),
            (ENV_INTERFACE, "127.0.0.1"),
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_JSON, "yes"),
            (ENV_CONFIG_HOME, "/var/lib/driver"),
        ]);
        let settings = load_settings_with(&path, lookup).unwrap();
        assert_eq!(settings.server.port, 8088);
        assert_eq!(settings.server.interface, "127.0.0.1");
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
        assert_eq!(settings.driver.config_home.as_deref(), Some("/var/lib/driver"));
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let lookup = env(&[(ENV_HTTP_PORT, "70000"), (ENV_LOG_JSON, "maybe"), (ENV_INTERFACE, "")]);
        let settings = load_settings_with(Path::new("/nonexistent"), lookup).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert!(!settings.logging.json);
        assert_eq!(settings.server.interface, "0.0.0.0");
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nope"), None);
        assert_eq!(parse_u16_range("0", 1, 10), None);
        assert_eq!(parse_u16_range("5", 1, 10), Some(5));
        assert_eq!(parse_u16_range("x", 1, 10), None);
    }

    #[test]
    fn driver_metadata_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("driver.json");
        std::fs::write(
            &path,
            r#"{"driver_id": "demo", "name": {"en": "Demo"}, "version": "1.0.0", "icon": "custom:demo"}"#,
        )
        .unwrap();
        let meta = load_driver_metadata(&path).unwrap();
        assert_eq!(meta.driver_id, "demo");
        assert_eq!(meta.version, "1.0.0");
        assert_eq!(meta.extra["icon"], "custom:demo");
    }

    #[test]
    fn driver_metadata_missing_file() {
        let err = load_driver_metadata(Path::new("/nonexistent/driver.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }

    #[test]
    fn driver_metadata_requires_driver_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("driver.json");
        std::fs::write(&path, r#"{"driver_id": " ", "name": {"en": "Demo"}, "version": "1"}"#).unwrap();
        let err = load_driver_metadata(&path).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidMetadata { .. }));
    }
}
