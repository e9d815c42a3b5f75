//! Setup-flow state machine.
//!
//! ```text
//! IDLE -> AWAITING_DRIVER -> WAIT_USER_ACTION -> AWAITING_DRIVER -> ... -> COMPLETE | ERROR
//! ```
//!
//! One flow per client. A flow exists from `setup_driver` until a terminal
//! state, an abort from the hub or the client disconnecting. Each flow owns a
//! [`CancellationToken`] handed to driver logic; aborting cancels it and
//! drops an in-flight driver call, after which nothing more is sent for that
//! flow.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use ucapi_core::{
    ClientId, Envelope, EventCategory, EventMessage, IntegrationSetupError, SetupAction,
    SetupChange, SetupHandler, SetupRequest, StatusCode,
};

use crate::client::ClientRegistry;
use crate::events::{DriverEvent, DriverEvents};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupPhase {
    /// Driver logic is working on the last request.
    AwaitingDriver,
    /// A setup screen is shown; waiting for `set_driver_user_data`.
    WaitUserAction,
}

struct SetupSession {
    phase: SetupPhase,
    cancel: CancellationToken,
}

impl SetupSession {
    fn new() -> Self {
        Self {
            phase: SetupPhase::AwaitingDriver,
            cancel: CancellationToken::new(),
        }
    }
}

pub struct SetupFlows {
    sessions: DashMap<ClientId, SetupSession>,
    handler: RwLock<Option<Arc<dyn SetupHandler>>>,
    registry: Arc<ClientRegistry>,
    events: DriverEvents,
    settle_delay: Duration,
}

impl SetupFlows {
    pub fn new(registry: Arc<ClientRegistry>, events: DriverEvents, settle_delay: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            handler: RwLock::new(None),
            registry,
            events,
            settle_delay,
        }
    }

    /// Install driver setup logic. Without a handler, setup requests are
    /// reported as [`DriverEvent`]s, the driver answers through
    /// [`SetupFlows::apply_action`] and no flow state is kept here.
    pub fn set_handler(&self, handler: Arc<dyn SetupHandler>) {
        *self.handler.write() = Some(handler);
    }

    pub fn has_handler(&self) -> bool {
        self.handler.read().is_some()
    }

    pub fn phase(&self, client_id: &ClientId) -> Option<SetupPhase> {
        self.sessions.get(client_id).map(|s| s.phase)
    }

    pub fn active_flows(&self) -> usize {
        self.sessions.len()
    }

    /// Handle a `setup_driver` request.
    pub async fn setup_driver(&self, client_id: &ClientId, req_id: u64, msg_data: Option<&Value>) {
        let Some(setup_data) = msg_data
            .and_then(|data| data.get("setup_data"))
            .and_then(Value::as_object)
            .cloned()
        else {
            self.reject(client_id, req_id, "setup_driver without setup_data");
            return;
        };
        let reconfigure = msg_data
            .and_then(|data| data.get("reconfigure"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let Some(handler) = self.handler() else {
            // Legacy drivers run the flow themselves; nothing is tracked here.
            let _ = self.abort(client_id);
            self.acknowledge(client_id, req_id);
            self.events.emit(DriverEvent::SetupDriver {
                client_id: client_id.clone(),
                reconfigure,
                setup_data,
            });
            return;
        };

        let token = self.begin(client_id);
        self.acknowledge(client_id, req_id);
        tracing::info!(client_id = %client_id, reconfigure, "Setup flow started");
        let request = SetupRequest::DriverSetup {
            reconfigure,
            setup_data,
        };
        self.run_driver(client_id, handler, request, token, true).await;
    }

    /// Handle a `set_driver_user_data` request.
    pub async fn set_driver_user_data(
        &self,
        client_id: &ClientId,
        req_id: u64,
        msg_data: Option<&Value>,
    ) {
        let Some(request) = msg_data.and_then(parse_user_data) else {
            self.reject(client_id, req_id, "set_driver_user_data without input_values or confirm");
            return;
        };

        let handler = self.handler();
        let token = match handler {
            Some(_) => self.resume(client_id),
            None => CancellationToken::new(),
        };
        self.acknowledge(client_id, req_id);

        tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!(client_id = %client_id, "Setup flow cancelled before driver call");
                return;
            }
            () = tokio::time::sleep(self.settle_delay) => {}
        }
        self.send_progress(client_id);

        let Some(handler) = handler else {
            let client_id = client_id.clone();
            self.events.emit(match request {
                SetupRequest::UserConfirmation { confirm } => {
                    DriverEvent::SetupDriverUserConfirmation { client_id, confirm }
                }
                SetupRequest::UserData { input_values } => {
                    DriverEvent::SetupDriverUserData { client_id, input_values }
                }
                SetupRequest::DriverSetup { .. } => return,
            });
            return;
        };
        self.run_driver(client_id, handler, request, token, false).await;
    }

    /// Abandon the client's flow, cancelling any in-flight driver call.
    /// Nothing is sent to the client. Returns whether a flow existed.
    pub fn abort(&self, client_id: &ClientId) -> bool {
        match self.sessions.remove(client_id) {
            Some((_, session)) => {
                session.cancel.cancel();
                tracing::info!(client_id = %client_id, "Setup flow aborted");
                true
            }
            None => false,
        }
    }

    /// Send a `SETUP` progress event.
    pub fn send_progress(&self, client_id: &ClientId) {
        self.send_change(client_id, &SetupChange::progress());
    }

    /// Advance the flow with `action` and notify the client.
    pub fn apply_action(&self, client_id: &ClientId, action: SetupAction) {
        let change = SetupChange::from(action);
        if change.is_terminal() {
            let _ = self.sessions.remove(client_id);
            tracing::info!(client_id = %client_id, state = ?change.state, error = ?change.error, "Setup flow finished");
        } else if let Some(mut session) = self.sessions.get_mut(client_id) {
            session.phase = SetupPhase::WaitUserAction;
        }
        self.send_change(client_id, &change);
    }

    fn handler(&self) -> Option<Arc<dyn SetupHandler>> {
        self.handler.read().clone()
    }

    /// Start a fresh flow, cancelling the previous one of this client.
    fn begin(&self, client_id: &ClientId) -> CancellationToken {
        let session = SetupSession::new();
        let token = session.cancel.clone();
        if let Some(previous) = self.sessions.insert(client_id.clone(), session) {
            previous.cancel.cancel();
            tracing::debug!(client_id = %client_id, "Restarting setup flow");
        }
        token
    }

    /// Continue the flow after user input. A missing flow is recreated.
    fn resume(&self, client_id: &ClientId) -> CancellationToken {
        let mut session = self.sessions.entry(client_id.clone()).or_insert_with(|| {
            tracing::debug!(client_id = %client_id, "User data without an active setup flow");
            SetupSession::new()
        });
        session.phase = SetupPhase::AwaitingDriver;
        session.cancel.clone()
    }

    async fn run_driver(
        &self,
        client_id: &ClientId,
        handler: Arc<dyn SetupHandler>,
        request: SetupRequest,
        token: CancellationToken,
        progress_first: bool,
    ) {
        let call = AssertUnwindSafe(handler.handle(request, token.clone())).catch_unwind();
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::info!(client_id = %client_id, "Setup flow cancelled while awaiting driver");
                return;
            }
            outcome = call => outcome,
        };
        if token.is_cancelled() {
            return;
        }

        let action = match outcome {
            Ok(Ok(action)) => action,
            Ok(Err(error)) => {
                tracing::warn!(client_id = %client_id, %error, "Setup handler failed");
                SetupAction::Error(IntegrationSetupError::Other)
            }
            Err(_) => {
                tracing::error!(client_id = %client_id, "Setup handler panicked");
                SetupAction::Error(IntegrationSetupError::Other)
            }
        };

        let needs_user = matches!(
            action,
            SetupAction::RequestUserInput { .. } | SetupAction::RequestUserConfirmation { .. }
        );
        if progress_first && needs_user {
            self.send_progress(client_id);
        }
        self.apply_action(client_id, action);
    }

    fn acknowledge(&self, client_id: &ClientId, req_id: u64) {
        let _ = self.registry.send(client_id, &Envelope::result(req_id, StatusCode::Ok));
    }

    /// Answer 400 and end the flow with an error.
    fn reject(&self, client_id: &ClientId, req_id: u64, reason: &str) {
        tracing::warn!(client_id = %client_id, req_id, reason, "Invalid setup request");
        let _ = self
            .registry
            .send(client_id, &Envelope::result(req_id, StatusCode::BadRequest));
        if let Some((_, session)) = self.sessions.remove(client_id) {
            session.cancel.cancel();
        }
        self.send_change(client_id, &SetupChange::error(IntegrationSetupError::Other));
    }

    fn send_change(&self, client_id: &ClientId, change: &SetupChange) {
        match serde_json::to_value(change) {
            Ok(data) => {
                let event = Envelope::event(EventMessage::DriverSetupChange, data, EventCategory::Device);
                let _ = self.registry.send(client_id, &event);
            }
            Err(error) => tracing::error!(%error, "Failed to encode setup change"),
        }
    }
}

/// `input_values` wins over `confirm` when both are present.
fn parse_user_data(msg_data: &Value) -> Option<SetupRequest> {
    if let Some(input_values) = msg_data.get("input_values").and_then(Value::as_object) {
        return Some(SetupRequest::UserData {
            input_values: input_values.clone(),
        });
    }
    msg_data
        .get("confirm")
        .and_then(Value::as_bool)
        .map(|confirm| SetupRequest::UserConfirmation { confirm })
}
