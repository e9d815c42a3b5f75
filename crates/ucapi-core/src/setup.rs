//! Setup-flow types shared between the server and driver logic.
//!
//! Driver logic implements [`SetupHandler`]: it receives one
//! [`SetupRequest`] per hub interaction and answers with the next
//! [`SetupAction`]. The server turns each action into a
//! `driver_setup_change` event described by [`SetupChange`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::text::LocalizedText;

/// Error returned by driver logic.
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// Key-value data entered in the hub's setup screens.
pub type SetupValues = Map<String, Value>;

/// Reason attached to a failed setup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationSetupError {
    #[default]
    None,
    NotFound,
    ConnectionRefused,
    AuthorizationError,
    Timeout,
    Other,
}

/// One step of a setup flow handed to driver logic.
#[derive(Clone, Debug, PartialEq)]
pub enum SetupRequest {
    /// Start (or restart) the flow.
    DriverSetup {
        reconfigure: bool,
        setup_data: SetupValues,
    },
    /// Answer to a [`SetupAction::RequestUserInput`] screen.
    UserData { input_values: SetupValues },
    /// Answer to a [`SetupAction::RequestUserConfirmation`] screen.
    UserConfirmation { confirm: bool },
}

/// Driver logic's answer to a [`SetupRequest`].
#[derive(Clone, Debug, PartialEq)]
pub enum SetupAction {
    /// Show an input screen. `settings` follows the hub's settings schema.
    RequestUserInput {
        title: LocalizedText,
        settings: Vec<Value>,
    },
    RequestUserConfirmation {
        title: LocalizedText,
        header: Option<LocalizedText>,
        image: Option<String>,
        footer: Option<LocalizedText>,
    },
    Complete,
    Error(IntegrationSetupError),
}

/// Driver logic for interactive setup flows.
///
/// `cancel` is triggered when the hub aborts the flow or disconnects; a
/// handler doing long work should stop once it fires. Panics are treated as
/// failures.
#[async_trait]
pub trait SetupHandler: Send + Sync {
    async fn handle(
        &self,
        request: SetupRequest,
        cancel: CancellationToken,
    ) -> Result<SetupAction, DriverError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetupEventType {
    Setup,
    Stop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetupState {
    Setup,
    WaitUserAction,
    Ok,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequireUserAction {
    Input {
        title: LocalizedText,
        settings: Vec<Value>,
    },
    Confirmation {
        title: LocalizedText,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message1: Option<LocalizedText>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message2: Option<LocalizedText>,
    },
}

/// Payload of a `driver_setup_change` event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetupChange {
    pub event_type: SetupEventType,
    pub state: SetupState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<IntegrationSetupError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_user_action: Option<RequireUserAction>,
}

impl SetupChange {
    fn new(event_type: SetupEventType, state: SetupState) -> Self {
        Self {
            event_type,
            state,
            error: None,
            require_user_action: None,
        }
    }

    /// Driver is working on the current step.
    pub fn progress() -> Self {
        Self::new(SetupEventType::Setup, SetupState::Setup)
    }

    pub fn complete() -> Self {
        Self::new(SetupEventType::Stop, SetupState::Ok)
    }

    pub fn error(reason: IntegrationSetupError) -> Self {
        Self {
            error: Some(reason),
            ..Self::new(SetupEventType::Stop, SetupState::Error)
        }
    }

    pub fn wait_user_action(action: RequireUserAction) -> Self {
        Self {
            require_user_action: Some(action),
            ..Self::new(SetupEventType::Setup, SetupState::WaitUserAction)
        }
    }

    /// Whether this change ends the flow.
    pub fn is_terminal(&self) -> bool {
        self.event_type == SetupEventType::Stop
    }
}

impl From<SetupAction> for SetupChange {
    fn from(action: SetupAction) -> Self {
        match action {
            SetupAction::RequestUserInput { title, settings } => {
                Self::wait_user_action(RequireUserAction::Input { title, settings })
            }
            SetupAction::RequestUserConfirmation {
                title,
                header,
                image,
                footer,
            } => Self::wait_user_action(RequireUserAction::Confirmation {
                title,
                message1: header,
                image,
                message2: footer,
            }),
            SetupAction::Complete => Self::complete(),
            SetupAction::Error(reason) => Self::error(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_json(change: SetupChange) -> Value {
        serde_json::to_value(change).unwrap()
    }

    #[test]
    fn progress_payload() {
        assert_eq!(to_json(SetupChange::progress()), json!({"event_type": "SETUP", "state": "SETUP"}));
    }

    #[test]
    fn terminal_payloads() {
        assert_eq!(to_json(SetupChange::complete()), json!({"event_type": "STOP", "state": "OK"}));
        assert_eq!(
            to_json(SetupChange::error(IntegrationSetupError::Other)),
            json!({"event_type": "STOP", "state": "ERROR", "error": "OTHER"})
        );
        assert!(SetupChange::complete().is_terminal());
        assert!(!SetupChange::progress().is_terminal());
    }

    #[test]
    fn user_input_payload() {
        let action = SetupAction::RequestUserInput {
            title: "Pairing".into(),
            settings: vec![json!({"id": "pin", "label": {"en": "PIN"}, "field": {"text": {"value": ""}}})],
        };
        let v = to_json(action.into());
        assert_eq!(v["event_type"], "SETUP");
        assert_eq!(v["state"], "WAIT_USER_ACTION");
        assert_eq!(v["require_user_action"]["input"]["title"], json!({"en": "Pairing"}));
        assert_eq!(v["require_user_action"]["input"]["settings"][0]["id"], "pin");
    }

    #[test]
    fn confirmation_payload_maps_header_and_footer() {
        let action = SetupAction::RequestUserConfirmation {
            title: "Press the button".into(),
            header: Some("On the device".into()),
            image: None,
            footer: Some("Then continue".into()),
        };
        let v = to_json(action.into());
        let confirmation = &v["require_user_action"]["confirmation"];
        assert_eq!(confirmation["message1"], json!({"en": "On the device"}));
        assert_eq!(confirmation["message2"], json!({"en": "Then continue"}));
        assert!(confirmation.get("image").is_none());
    }

    #[test]
    fn error_reason_names() {
        assert_eq!(serde_json::to_value(IntegrationSetupError::AuthorizationError).unwrap(), "AUTHORIZATION_ERROR");
        assert_eq!(serde_json::to_value(IntegrationSetupError::ConnectionRefused).unwrap(), "CONNECTION_REFUSED");
        assert_eq!(IntegrationSetupError::default(), IntegrationSetupError::None);
    }
}
