//! # ucapi-settings
//!
//! Layered settings for integration drivers:
//! 1. **Compiled defaults** ([`IntegrationSettings::default()`])
//! 2. **Settings file** (`<config home>/settings.json`, deep-merged)
//! 3. **Environment variables** (`UC_*`, highest priority)
//!
//! Also loads the driver description (`driver.json`) served to the hub.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, config_home, deep_merge, load_driver_metadata, load_settings,
    load_settings_from_path, load_settings_with, settings_path,
};
pub use types::{DriverSettings, IntegrationSettings, LoggingSettings, ServerSettings, SetupSettings};
