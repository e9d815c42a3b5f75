//! End-to-end tests using a real WebSocket client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use ucapi_core::{
    Attributes, DeviceState, DriverError, DriverMetadata, Entity, EntityType, SetupAction,
    SetupHandler, SetupRequest,
};
use ucapi_server::{start, DriverEvent, IntegrationApi, ServerConfig, ServerHandle};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

fn config() -> ServerConfig {
    ServerConfig {
        interface: "127.0.0.1".into(),
        port: 0,
        setup_settle_delay: Duration::from_millis(10),
        ..ServerConfig::default()
    }
}

fn new_api() -> IntegrationApi {
    let metadata = DriverMetadata::new("e2e_driver", "E2E driver", "0.9.0");
    IntegrationApi::new(metadata, &config())
}

async fn boot(api: IntegrationApi) -> (String, Arc<IntegrationApi>, ServerHandle) {
    let api = Arc::new(api);
    let handle = start(config(), Arc::clone(&api)).await.unwrap();
    (format!("ws://127.0.0.1:{}/ws", handle.port), api, handle)
}

/// Connect and consume the authentication response.
async fn connect(url: &str) -> WsStream {
    let (mut ws, _) = connect_async(url).await.unwrap();
    let auth = read_json(&mut ws).await;
    assert_eq!(auth["msg"], "authentication");
    assert_eq!(auth["code"], 200);
    ws
}

async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send(ws: &mut WsStream, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

async fn request(ws: &mut WsStream, id: u64, msg: &str, msg_data: Value) -> Value {
    send(ws, json!({"kind": "req", "id": id, "msg": msg, "msg_data": msg_data})).await;
    let resp = read_json(ws).await;
    assert_eq!(resp["kind"], "resp");
    assert_eq!(resp["req_id"], id);
    resp
}

async fn wait_for_clients(api: &IntegrationApi, expected: usize) {
    timeout(TIMEOUT, async {
        while api.client_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client count did not settle");
}

struct Pairing;

#[async_trait]
impl SetupHandler for Pairing {
    async fn handle(
        &self,
        request: SetupRequest,
        _cancel: CancellationToken,
    ) -> Result<SetupAction, DriverError> {
        match request {
            SetupRequest::DriverSetup { .. } => Ok(SetupAction::RequestUserInput {
                title: "Pairing code".into(),
                settings: vec![json!({"id": "code", "label": {"en": "Code"}, "field": {"number": {"value": 0}}})],
            }),
            SetupRequest::UserData { input_values } if input_values.contains_key("code") => {
                Ok(SetupAction::Complete)
            }
            _ => Err("unexpected setup step".into()),
        }
    }
}

#[tokio::test]
async fn e2e_version_and_state() {
    let (url, api, handle) = boot(new_api()).await;
    let mut ws = connect(&url).await;

    let resp = request(&mut ws, 1, "get_driver_version", json!({})).await;
    assert_eq!(resp["msg"], "driver_version");
    assert_eq!(resp["msg_data"]["name"], "E2E driver");

    assert!(api.set_device_state(DeviceState::Connected));
    let event = read_json(&mut ws).await;
    assert_eq!(event["msg"], "device_state");

    let resp = request(&mut ws, 2, "get_device_state", json!({})).await;
    assert_eq!(resp["msg_data"]["state"], "CONNECTED");

    handle.shutdown().await;
}

#[tokio::test]
async fn e2e_root_path_serves_websocket() {
    let (url, _api, handle) = boot(new_api()).await;
    let root = url.trim_end_matches("/ws").to_owned() + "/";
    let mut ws = connect(&root).await;
    let resp = request(&mut ws, 1, "get_device_state", json!({})).await;
    assert_eq!(resp["code"], 200);
    handle.shutdown().await;
}

#[tokio::test]
async fn e2e_malformed_frame_keeps_connection() {
    let (url, _api, handle) = boot(new_api()).await;
    let mut ws = connect(&url).await;

    ws.send(Message::text("{not json")).await.unwrap();
    let resp = request(&mut ws, 7, "no_such_thing", json!({})).await;
    assert_eq!(resp["code"], 500);
    assert_eq!(resp["msg"], "result");

    handle.shutdown().await;
}

#[tokio::test]
async fn e2e_setup_flow_input_then_complete() {
    let (url, _api, handle) = boot(new_api().with_setup_handler(Arc::new(Pairing))).await;
    let mut ws = connect(&url).await;

    let resp = request(&mut ws, 1, "setup_driver", json!({"reconfigure": false, "setup_data": {}})).await;
    assert_eq!(resp["code"], 200);
    let progress = read_json(&mut ws).await;
    assert_eq!(progress["msg_data"], json!({"event_type": "SETUP", "state": "SETUP"}));
    let input = read_json(&mut ws).await;
    assert_eq!(input["msg_data"]["state"], "WAIT_USER_ACTION");
    assert_eq!(input["msg_data"]["require_user_action"]["input"]["settings"][0]["id"], "code");

    let resp = request(&mut ws, 2, "set_driver_user_data", json!({"input_values": {"code": "4711"}})).await;
    assert_eq!(resp["code"], 200);
    let progress = read_json(&mut ws).await;
    assert_eq!(progress["msg_data"]["state"], "SETUP");
    let done = read_json(&mut ws).await;
    assert_eq!(done["msg"], "driver_setup_change");
    assert_eq!(done["cat"], "DEVICE");
    assert_eq!(done["msg_data"], json!({"event_type": "STOP", "state": "OK"}));

    handle.shutdown().await;
}

#[tokio::test]
async fn e2e_device_state_reaches_connected_clients_only() {
    let (url, api, handle) = boot(new_api()).await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    let mut gone = connect(&url).await;
    wait_for_clients(&api, 3).await;

    gone.close(None).await.unwrap();
    wait_for_clients(&api, 2).await;

    assert!(api.set_device_state(DeviceState::Error));
    for ws in [&mut a, &mut b] {
        let event = read_json(ws).await;
        assert_eq!(event["msg"], "device_state");
        assert_eq!(event["msg_data"]["state"], "ERROR");
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn e2e_entity_change_and_untouched_image_on_wire() {
    let api = new_api();
    let image = "data:image/jpeg;base64,/9j/4AAQSkZJRgABAQ";
    let _ = api.available_entities().add(
        Entity::new("mp.kitchen", EntityType::MediaPlayer, "Kitchen speaker")
            .with_attribute("state", json!("PLAYING"))
            .with_attribute("media_image_url", json!(image)),
    );
    let (url, api, handle) = boot(api).await;
    let mut ws = connect(&url).await;

    let resp = request(&mut ws, 1, "subscribe_events", json!({"entity_ids": ["mp.kitchen"]})).await;
    assert_eq!(resp["code"], 200);

    let resp = request(&mut ws, 2, "get_entity_states", json!({})).await;
    assert_eq!(resp["msg_data"][0]["attributes"]["media_image_url"], image);

    let mut attributes = Attributes::new();
    let _ = attributes.insert("state".into(), json!("PAUSED"));
    assert!(api.configured_entities().update_attributes("mp.kitchen", attributes));

    let event = read_json(&mut ws).await;
    assert_eq!(event["msg"], "entity_change");
    assert_eq!(event["cat"], "ENTITY");
    assert_eq!(
        event["msg_data"],
        json!({"entity_id": "mp.kitchen", "entity_type": "media_player", "attributes": {"state": "PAUSED"}})
    );

    handle.shutdown().await;
}

/// Parks until cancelled, keeping the flow's token for inspection.
struct WaitForever {
    started: Arc<Notify>,
    token: Arc<parking_lot::Mutex<Option<CancellationToken>>>,
}

#[async_trait]
impl SetupHandler for WaitForever {
    async fn handle(
        &self,
        _request: SetupRequest,
        cancel: CancellationToken,
    ) -> Result<SetupAction, DriverError> {
        *self.token.lock() = Some(cancel.clone());
        self.started.notify_one();
        cancel.cancelled().await;
        Ok(SetupAction::Complete)
    }
}

#[tokio::test]
async fn e2e_disconnect_cancels_setup_flow() {
    let started = Arc::new(Notify::new());
    let token = Arc::new(parking_lot::Mutex::new(None));
    let handler = WaitForever {
        started: Arc::clone(&started),
        token: Arc::clone(&token),
    };
    let (url, api, handle) = boot(new_api().with_setup_handler(Arc::new(handler))).await;
    let mut driver_events = api.subscribe_driver_events();

    let mut ws = connect(&url).await;
    let resp = request(&mut ws, 1, "setup_driver", json!({"setup_data": {}})).await;
    assert_eq!(resp["code"], 200);
    timeout(TIMEOUT, started.notified()).await.unwrap();
    let flow_token = token.lock().clone().unwrap();
    assert!(!flow_token.is_cancelled());

    drop(ws);
    timeout(TIMEOUT, flow_token.cancelled()).await.unwrap();
    wait_for_clients(&api, 0).await;

    timeout(TIMEOUT, async {
        while !matches!(driver_events.recv().await, Ok(DriverEvent::ClientDisconnected(_))) {}
    })
    .await
    .expect("no disconnect event");

    // the processing task is free again
    let mut ws = connect(&url).await;
    let resp = request(&mut ws, 2, "get_device_state", json!({})).await;
    assert_eq!(resp["code"], 200);

    handle.shutdown().await;
}
