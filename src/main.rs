//! # ucapi-driver
//!
//! Example integration driver: loads settings and the driver description,
//! registers a few demo entities and serves the hub WebSocket protocol until
//! interrupted.

#![deny(unsafe_code)]

mod demo;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ucapi_core::{DeviceState, DriverMetadata};
use ucapi_server::{DriverEvent, IntegrationApi, ServerConfig};

/// Integration driver serving the hub WebSocket protocol.
#[derive(Parser, Debug)]
#[command(name = "ucapi-driver", about = "Example integration driver")]
struct Cli {
    /// Settings file (defaults to `<config home>/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Driver description file (overrides `driver.metadataPath`).
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Log level (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings come first: the log level lives there.
    let mut settings = match &args.config {
        Some(path) => ucapi_settings::load_settings_from_path(path),
        None => ucapi_settings::load_settings(),
    }
    .context("Failed to load settings")?;
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    let level = args.log_level.as_deref().unwrap_or(&settings.logging.level);
    ucapi_core::logging::init_subscriber(level, settings.logging.json);

    let metadata = load_metadata(args.metadata, &settings);
    tracing::info!(
        driver_id = %metadata.driver_id,
        version = %metadata.version,
        "Starting integration driver"
    );

    let config = ServerConfig::from(&settings);
    let api = Arc::new(IntegrationApi::new(metadata, &config).with_setup_handler(Arc::new(demo::PairingSetup)));
    demo::register_entities(&api);

    let listener = tokio::spawn(handle_driver_events(Arc::clone(&api)));
    let handle = ucapi_server::start(config, Arc::clone(&api))
        .await
        .context("Failed to start integration server")?;
    tracing::info!(port = handle.port, "Waiting for the hub");

    tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
    tracing::info!("Shutting down");
    handle.shutdown().await;
    listener.abort();
    Ok(())
}

/// Read the driver description, falling back to a built-in one.
fn load_metadata(cli_path: Option<PathBuf>, settings: &ucapi_settings::IntegrationSettings) -> DriverMetadata {
    let path = cli_path.unwrap_or_else(|| {
        let configured = PathBuf::from(&settings.driver.metadata_path);
        match &settings.driver.config_home {
            Some(home) if configured.is_relative() => PathBuf::from(home).join(configured),
            _ => configured,
        }
    });
    match ucapi_settings::load_driver_metadata(&path) {
        Ok(metadata) => metadata,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "Using built-in driver description");
            DriverMetadata::new("ucapi_demo", "Demo integration", env!("CARGO_PKG_VERSION"))
        }
    }
}

/// React to hub lifecycle events.
async fn handle_driver_events(api: Arc<IntegrationApi>) {
    let mut events = api.subscribe_driver_events();
    loop {
        match events.recv().await {
            Ok(DriverEvent::Connect) => {
                let _ = api.set_device_state(DeviceState::Connected);
            }
            Ok(DriverEvent::Disconnect) => {
                let _ = api.set_device_state(DeviceState::Disconnected);
            }
            Ok(DriverEvent::EnterStandby) => tracing::info!("Hub entered standby"),
            Ok(DriverEvent::ExitStandby) => tracing::info!("Hub left standby"),
            Ok(DriverEvent::SubscribeEntities(ids)) => tracing::debug!(?ids, "Entities subscribed"),
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Driver event listener lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
