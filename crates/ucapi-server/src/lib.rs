//! # ucapi-server
//!
//! Server side of the integration driver protocol: a WebSocket endpoint
//! through which a hub discovers, subscribes to and commands the driver's
//! entities, and runs interactive setup flows.
//!
//! Inbound frames from all clients funnel into a single processing task
//! ([`protocol::handle_frame`]), so requests are handled one at a time in
//! arrival order. Outbound messages go through the per-client queues of
//! [`client::ClientRegistry`].

#![deny(unsafe_code)]

pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod event_bridge;
pub mod events;
pub mod protocol;
pub mod router;
pub mod server;
pub mod setup;

pub use api::IntegrationApi;
pub use config::ServerConfig;
pub use errors::{RequestError, ServerError};
pub use events::{DriverEvent, DriverEvents};
pub use server::{start, ServerHandle};
pub use setup::SetupPhase;
