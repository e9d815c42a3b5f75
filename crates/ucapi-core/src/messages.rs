//! Wire envelopes and the closed sets of message names.
//!
//! Three envelope shapes travel over the socket, distinguished by `kind`:
//!
//! ```text
//! {"kind":"req",   "id":1,     "msg":"get_device_state", "msg_data":{}}
//! {"kind":"resp",  "req_id":1, "code":200, "msg":"device_state", "msg_data":{...}}
//! {"kind":"event", "msg":"entity_change", "msg_data":{...}, "cat":"ENTITY"}
//! ```
//!
//! Message names are kept as strings inside the envelopes so that unknown
//! names still decode (and can be answered); the typed enums below are the
//! closed sets the engine dispatches on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::StatusCode;

/// Declares a closed set of wire message names with `as_str` / `parse`.
macro_rules! wire_names {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            pub fn parse(name: &str) -> Option<Self> {
                match name {
                    $($wire => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_names!(
    /// Requests the hub sends to the driver.
    RequestMessage {
        GetDriverVersion => "get_driver_version",
        GetDeviceState => "get_device_state",
        GetAvailableEntities => "get_available_entities",
        GetEntityStates => "get_entity_states",
        EntityCommand => "entity_command",
        SubscribeEvents => "subscribe_events",
        UnsubscribeEvents => "unsubscribe_events",
        GetDriverMetadata => "get_driver_metadata",
        SetupDriver => "setup_driver",
        SetDriverUserData => "set_driver_user_data",
    }
);

wire_names!(
    /// Message names of responses the driver sends back.
    ResponseMessage {
        Authentication => "authentication",
        DriverVersion => "driver_version",
        DeviceState => "device_state",
        AvailableEntities => "available_entities",
        EntityStates => "entity_states",
        DriverMetadata => "driver_metadata",
        Result => "result",
    }
);

wire_names!(
    /// Events the driver pushes to the hub.
    EventMessage {
        DeviceState => "device_state",
        EntityChange => "entity_change",
        DriverSetupChange => "driver_setup_change",
    }
);

wire_names!(
    /// Events the hub sends to the driver.
    RemoteEvent {
        Connect => "connect",
        Disconnect => "disconnect",
        EnterStandby => "enter_standby",
        ExitStandby => "exit_standby",
        AbortDriverSetup => "abort_driver_setup",
    }
);

/// Category attached to outbound events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    Device,
    Entity,
}

impl EventCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Device => "DEVICE",
            Self::Entity => "ENTITY",
        }
    }
}

/// A request from the hub.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id echoed back as `req_id`.
    pub id: u64,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_data: Option<Value>,
}

/// A response to exactly one request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub req_id: u64,
    pub code: StatusCode,
    pub msg: String,
    #[serde(default)]
    pub msg_data: Value,
}

/// An event, in either direction. Events carry no correlation id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub msg: String,
    #[serde(default)]
    pub msg_data: Value,
    /// Outbound events carry an [`EventCategory`]; inbound categories are
    /// informational and not validated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cat: Option<String>,
}

/// The unit of wire communication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Envelope {
    #[serde(rename = "req")]
    Request(Request),
    #[serde(rename = "resp")]
    Response(Response),
    #[serde(rename = "event")]
    Event(InboundEvent),
}

impl Envelope {
    /// Build a response envelope.
    pub fn response(req_id: u64, msg: ResponseMessage, code: StatusCode, msg_data: Value) -> Self {
        Self::Response(Response {
            req_id,
            code,
            msg: msg.as_str().to_owned(),
            msg_data,
        })
    }

    /// Build a `result` response with an empty payload.
    pub fn result(req_id: u64, code: StatusCode) -> Self {
        Self::response(req_id, ResponseMessage::Result, code, empty_object())
    }

    /// Build an outbound event envelope.
    pub fn event(msg: EventMessage, msg_data: Value, cat: EventCategory) -> Self {
        Self::Event(InboundEvent {
            msg: msg.as_str().to_owned(),
            msg_data,
            cat: Some(cat.as_str().to_owned()),
        })
    }

    /// Message name of this envelope.
    pub fn msg(&self) -> &str {
        match self {
            Self::Request(r) => &r.msg,
            Self::Response(r) => &r.msg,
            Self::Event(e) => &e.msg,
        }
    }
}

/// `{}`, the payload of bare acknowledgements.
pub fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
