use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use ucapi_core::ClientId;

use crate::api::IntegrationApi;
use crate::client;
use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::event_bridge;
use crate::protocol;

const MESSAGE_QUEUE_CAPACITY: usize = 1024;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<IntegrationApi>,
    pub message_tx: mpsc::Sender<(ClientId, String)>,
    pub heartbeat_interval: Duration,
}

/// Build the Axum router. The WebSocket endpoint is served at `/` and `/ws`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Bind and start serving. Returns a handle owning the background tasks.
pub async fn start(config: ServerConfig, api: Arc<IntegrationApi>) -> Result<ServerHandle, ServerError> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let local_addr = listener.local_addr()?;

    let registry = Arc::clone(api.registry());
    let bridge = event_bridge::create_bridge(Arc::clone(&registry), api.configured_entities().subscribe());
    let cleanup = client::start_cleanup_task(registry, config.cleanup_interval);

    let (msg_tx, msg_rx) = mpsc::channel::<(ClientId, String)>(MESSAGE_QUEUE_CAPACITY);
    let processor = tokio::spawn(process_messages(msg_rx, Arc::clone(&api)));

    let router = build_router(AppState {
        api: Arc::clone(&api),
        message_tx: msg_tx,
        heartbeat_interval: config.heartbeat_interval,
    });

    let shutdown = CancellationToken::new();
    let server = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let service = router.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(error) = axum::serve(listener, service)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
            {
                tracing::error!(%error, "Server stopped with error");
            }
        }
    });

    tracing::info!(%local_addr, "Integration server started");

    Ok(ServerHandle {
        port: local_addr.port(),
        local_addr,
        api,
        shutdown,
        server,
        background: vec![bridge, cleanup, processor],
    })
}

/// Handle returned by [`start`]; keeps the background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    pub local_addr: SocketAddr,
    api: Arc<IntegrationApi>,
    shutdown: CancellationToken,
    server: tokio::task::JoinHandle<()>,
    background: Vec<tokio::task::JoinHandle<()>>,
}

impl ServerHandle {
    /// Stop accepting connections, drop every client and stop background tasks.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for client_id in self.api.registry().ids() {
            self.api.client_disconnected(&client_id);
        }
        for task in &self.background {
            task.abort();
        }
        let _ = self.server.await;
        tracing::info!("Integration server stopped");
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, peer, state))
}

async fn handle_socket(socket: WebSocket, peer: SocketAddr, state: AppState) {
    let (client_id, rx) = state.api.client_connected(peer);

    client::handle_ws_connection(
        socket,
        client_id.clone(),
        rx,
        Arc::clone(state.api.registry()),
        state.message_tx,
        state.heartbeat_interval,
    )
    .await;

    state.api.client_disconnected(&client_id);
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "connections": state.api.client_count(),
        "device_state": state.api.device_state(),
    }))
}

/// Single consumer of all inbound frames; each frame is handled to
/// completion before the next one.
async fn process_messages(mut rx: mpsc::Receiver<(ClientId, String)>, api: Arc<IntegrationApi>) {
    while let Some((client_id, raw)) = rx.recv().await {
        protocol::handle_frame(&api, &client_id, &raw).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::api;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state() -> AppState {
        let (message_tx, _) = mpsc::channel(8);
        AppState {
            api: Arc::new(api()),
            message_tx,
            heartbeat_interval: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn health_reports_connections() {
        let router = build_router(state());
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["device_state"], "DISCONNECTED");
    }

    #[tokio::test]
    async fn plain_get_on_ws_route_is_rejected() {
        let router = build_router(state());
        let response = router
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error() || response.status().is_server_error());
    }

    #[tokio::test]
    async fn start_binds_free_port() {
        let config = ServerConfig {
            interface: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        };
        let handle = start(config, Arc::new(api())).await.unwrap();
        assert!(handle.port > 0);
        assert_eq!(handle.local_addr.port(), handle.port);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn start_reports_bind_failure() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            interface: "127.0.0.1".into(),
            port: taken.local_addr().unwrap().port(),
            ..ServerConfig::default()
        };
        let err = start(config, Arc::new(api())).await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}
