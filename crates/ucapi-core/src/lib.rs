//! # ucapi-core
//!
//! Shared model for the integration driver protocol:
//! - Wire envelopes (`req` / `resp` / `event`) and the closed sets of
//!   message names exchanged with the hub
//! - Status codes, event categories and the driver device state
//! - Entities and the in-memory `available` / `configured` entity stores
//! - Setup-flow actions, requests and `driver_setup_change` payloads
//! - Logging initialization and test capture helpers

#![deny(unsafe_code)]

pub mod device;
pub mod driver;
pub mod entities;
pub mod entity;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod setup;
pub mod status;
pub mod text;

pub use device::DeviceState;
pub use driver::{DriverMetadata, DriverVersion, VersionInfo};
pub use entities::{Entities, EntityChange};
pub use entity::{Attributes, CommandHandler, Entity, EntityDescriptor, EntityState, EntityType};
pub use ids::ClientId;
pub use messages::{
    empty_object, Envelope, EventCategory, EventMessage, InboundEvent, RemoteEvent, Request,
    RequestMessage, Response, ResponseMessage,
};
pub use setup::{
    DriverError, IntegrationSetupError, SetupAction, SetupChange, SetupHandler, SetupRequest,
    SetupValues,
};
pub use status::StatusCode;
pub use text::LocalizedText;

/// Version of the protocol implementation reported in `driver_version`.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");
