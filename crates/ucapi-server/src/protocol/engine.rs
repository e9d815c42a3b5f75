//! Decoding and dispatch of inbound frames.
//!
//! Every decoded request is answered with exactly one response carrying its
//! id. Frames that fail to decode are logged and dropped without a reply,
//! since there is no id to correlate with.

use serde_json::Value;
use ucapi_core::{
    empty_object, ClientId, Envelope, InboundEvent, RemoteEvent, Request, RequestMessage,
    ResponseMessage, StatusCode,
};

use crate::api::IntegrationApi;
use crate::errors::RequestError;
use crate::events::DriverEvent;
use crate::protocol::params::{require_string_list, require_string_param};

struct Reply {
    msg: ResponseMessage,
    code: StatusCode,
    data: Value,
}

impl Reply {
    fn ok(msg: ResponseMessage, data: Value) -> Self {
        Self {
            msg,
            code: StatusCode::Ok,
            data,
        }
    }

    fn result(code: StatusCode) -> Self {
        Self {
            msg: ResponseMessage::Result,
            code,
            data: empty_object(),
        }
    }
}

/// Handle one text frame received from `client_id`.
pub async fn handle_frame(api: &IntegrationApi, client_id: &ClientId, raw: &str) {
    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(envelope) => envelope,
        Err(error) => {
            tracing::warn!(client_id = %client_id, %error, "Dropping malformed message");
            return;
        }
    };

    match envelope {
        Envelope::Request(request) => handle_request(api, client_id, request).await,
        Envelope::Event(event) => handle_event(api, client_id, &event),
        Envelope::Response(response) => {
            tracing::debug!(client_id = %client_id, req_id = response.req_id, msg = %response.msg, "Ignoring response from hub");
        }
    }
}

async fn handle_request(api: &IntegrationApi, client_id: &ClientId, request: Request) {
    let req_id = request.id;
    tracing::debug!(client_id = %client_id, req_id, msg = %request.msg, "Request");

    let outcome = if api.registry().is_authenticated(client_id) {
        match RequestMessage::parse(&request.msg) {
            Some(message) => dispatch(api, client_id, req_id, message, request.msg_data.as_ref()).await,
            None => Err(RequestError::UnknownMessage { msg: request.msg }),
        }
    } else {
        Err(RequestError::Unauthorized)
    };

    let envelope = match outcome {
        Ok(None) => return,
        Ok(Some(reply)) => Envelope::response(req_id, reply.msg, reply.code, reply.data),
        Err(RequestError::Unauthorized) => {
            tracing::warn!(client_id = %client_id, req_id, "Request from unauthenticated client");
            Envelope::response(
                req_id,
                ResponseMessage::Authentication,
                StatusCode::Unauthorized,
                empty_object(),
            )
        }
        Err(error) => {
            tracing::warn!(client_id = %client_id, req_id, %error, "Request failed");
            Envelope::result(req_id, error.status())
        }
    };
    let _ = api.registry().send(client_id, &envelope);
}

/// Run a request. `Ok(None)` means the handler already sent its response.
async fn dispatch(
    api: &IntegrationApi,
    client_id: &ClientId,
    req_id: u64,
    message: RequestMessage,
    msg_data: Option<&Value>,
) -> Result<Option<Reply>, RequestError> {
    let reply = match message {
        RequestMessage::GetDriverVersion => Reply::ok(
            ResponseMessage::DriverVersion,
            serde_json::to_value(api.driver_version())?,
        ),
        RequestMessage::GetDeviceState => {
            let mut data = serde_json::Map::new();
            let _ = data.insert("state".into(), serde_json::to_value(api.device_state())?);
            Reply::ok(ResponseMessage::DeviceState, Value::Object(data))
        }
        RequestMessage::GetAvailableEntities => {
            let mut data = serde_json::Map::new();
            let _ = data.insert(
                "available_entities".into(),
                serde_json::to_value(api.available_entities().get_all())?,
            );
            Reply::ok(ResponseMessage::AvailableEntities, Value::Object(data))
        }
        RequestMessage::GetEntityStates => Reply::ok(
            ResponseMessage::EntityStates,
            serde_json::to_value(api.configured_entities().get_states())?,
        ),
        RequestMessage::GetDriverMetadata => Reply::ok(
            ResponseMessage::DriverMetadata,
            serde_json::to_value(api.metadata())?,
        ),
        RequestMessage::SubscribeEvents => {
            let entity_ids = require_string_list(msg_data, "entity_ids")?;
            let _ = api.router().subscribe(&entity_ids);
            Reply::result(StatusCode::Ok)
        }
        RequestMessage::UnsubscribeEvents => {
            let entity_ids = require_string_list(msg_data, "entity_ids")?;
            if api.router().unsubscribe(&entity_ids) {
                Reply::result(StatusCode::Ok)
            } else {
                Reply::result(StatusCode::NotFound)
            }
        }
        RequestMessage::EntityCommand => {
            let entity_id = require_string_param(msg_data, "entity_id")?;
            let cmd_id = require_string_param(msg_data, "cmd_id")?;
            let params = msg_data
                .and_then(|data| data.get("params"))
                .filter(|params| !params.is_null())
                .cloned();
            let code = api
                .router()
                .dispatch_command(client_id, &entity_id, &cmd_id, params)
                .await?;
            Reply::result(code)
        }
        RequestMessage::SetupDriver => {
            api.setup().setup_driver(client_id, req_id, msg_data).await;
            return Ok(None);
        }
        RequestMessage::SetDriverUserData => {
            api.setup().set_driver_user_data(client_id, req_id, msg_data).await;
            return Ok(None);
        }
    };
    Ok(Some(reply))
}

fn handle_event(api: &IntegrationApi, client_id: &ClientId, event: &InboundEvent) {
    let Some(remote) = RemoteEvent::parse(&event.msg) else {
        tracing::warn!(client_id = %client_id, msg = %event.msg, "Ignoring unknown event");
        return;
    };
    tracing::debug!(client_id = %client_id, event = %remote, "Event");

    let driver_event = match remote {
        RemoteEvent::Connect => DriverEvent::Connect,
        RemoteEvent::Disconnect => DriverEvent::Disconnect,
        RemoteEvent::EnterStandby => DriverEvent::EnterStandby,
        RemoteEvent::ExitStandby => DriverEvent::ExitStandby,
        RemoteEvent::AbortDriverSetup => {
            let _ = api.setup().abort(client_id);
            DriverEvent::SetupDriverAbort {
                client_id: client_id.clone(),
            }
        }
    };
    api.events().emit(driver_event);
}
