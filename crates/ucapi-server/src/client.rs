use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use ucapi_core::{empty_object, ClientId, Envelope, ResponseMessage, StatusCode};

use crate::protocol::redact::redact_for_log;

/// A connected hub session.
pub struct Client {
    pub id: ClientId,
    tx: mpsc::Sender<String>,
    authenticated: AtomicBool,
    last_pong: Mutex<Instant>,
}

impl Client {
    fn new(id: ClientId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            tx,
            authenticated: AtomicBool::new(true),
            last_pong: Mutex::new(Instant::now()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Relaxed)
    }

    pub fn record_pong(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    fn is_alive(&self, timeout: Duration) -> bool {
        self.last_pong.lock().elapsed() < timeout
    }

    fn try_send(&self, text: String) -> bool {
        match self.tx.try_send(text) {
            Ok(()) => true,
            Err(TrySendError::Full(msg)) => {
                tracing::warn!(
                    client_id = %self.id,
                    msg_len = msg.len(),
                    "Send queue full, dropping message"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(client_id = %self.id, "Send queue closed, dropping message");
                false
            }
        }
    }
}

/// Registry of all connected hub sessions.
///
/// Every outbound message goes through [`ClientRegistry::send`] or
/// [`ClientRegistry::broadcast`]; both are best effort and never block.
pub struct ClientRegistry {
    clients: DashMap<ClientId, Arc<Client>>,
    max_send_queue: usize,
    client_timeout: Duration,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize, client_timeout: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue,
            client_timeout,
        }
    }

    /// Register a session for `peer` and greet it with the `authentication`
    /// response. Returns the id and the receiving end of its send queue.
    pub fn register(&self, peer: SocketAddr) -> (ClientId, mpsc::Receiver<String>) {
        let id = ClientId::from_addr(peer);
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let client = Arc::new(Client::new(id.clone(), tx));
        if self.clients.insert(id.clone(), client).is_some() {
            tracing::warn!(client_id = %id, "Replaced client with the same id");
        }

        let _ = self.send(
            &id,
            &Envelope::response(0, ResponseMessage::Authentication, StatusCode::Ok, empty_object()),
        );
        (id, rx)
    }

    /// Remove a session. Returns `false` if it was already gone.
    pub fn unregister(&self, id: &ClientId) -> bool {
        self.clients.remove(id).is_some()
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.clients.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Unknown sessions are never authenticated.
    pub fn is_authenticated(&self, id: &ClientId) -> bool {
        self.clients.get(id).is_some_and(|c| c.is_authenticated())
    }

    pub fn set_authenticated(&self, id: &ClientId, authenticated: bool) -> bool {
        match self.clients.get(id) {
            Some(client) => {
                client.authenticated.store(authenticated, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn record_pong(&self, id: &ClientId) {
        if let Some(client) = self.clients.get(id) {
            client.record_pong();
        }
    }

    /// Send to one session. Returns whether the message was queued.
    pub fn send(&self, id: &ClientId, envelope: &Envelope) -> bool {
        let Some(client) = self.clients.get(id).map(|c| Arc::clone(c.value())) else {
            tracing::debug!(client_id = %id, msg = envelope.msg(), "Client not connected, dropping message");
            return false;
        };
        let Some(text) = encode(envelope) else {
            return false;
        };
        log_outbound(Some(id), &text);
        client.try_send(text)
    }

    /// Send to every session. Returns the number of sessions reached.
    pub fn broadcast(&self, envelope: &Envelope) -> usize {
        let Some(text) = encode(envelope) else {
            return 0;
        };
        log_outbound(None, &text);

        let clients: Vec<Arc<Client>> = self
            .clients
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        clients
            .into_iter()
            .filter(|client| client.try_send(text.clone()))
            .count()
    }

    /// Remove sessions that haven't answered a ping within the timeout.
    pub fn cleanup_dead_clients(&self) -> usize {
        let dead: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|entry| !entry.value().is_alive(self.client_timeout))
            .map(|entry| entry.key().clone())
            .collect();

        for id in &dead {
            let _ = self.unregister(id);
            tracing::info!(client_id = %id, "Cleaned up dead client");
        }
        dead.len()
    }
}

fn encode(envelope: &Envelope) -> Option<String> {
    match serde_json::to_string(envelope) {
        Ok(text) => Some(text),
        Err(error) => {
            tracing::error!(msg = envelope.msg(), %error, "Failed to serialize message");
            None
        }
    }
}

fn log_outbound(id: Option<&ClientId>, text: &str) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    let payload = serde_json::from_str::<Value>(text)
        .map(|value| redact_for_log(&value).to_string())
        .unwrap_or_default();
    match id {
        Some(id) => tracing::debug!(client_id = %id, %payload, "Outbound message"),
        None => tracing::debug!(%payload, "Outbound broadcast"),
    }
}

/// Drive a WebSocket connection: forward queued messages and pings out,
/// text frames in. Returns once either direction closes.
pub async fn handle_ws_connection(
    socket: WebSocket,
    client_id: ClientId,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<ClientRegistry>,
    on_message: mpsc::Sender<(ClientId, String)>,
    heartbeat_interval: Duration,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_cid = client_id.clone();
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat_interval);
        let _ = ping_interval.tick().await; // first tick is immediate

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                    tracing::trace!(client_id = %writer_cid, "Sent ping");
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let reader_cid = client_id.clone();
    let reader_registry = Arc::clone(&registry);
    let reader = tokio::spawn(async move {
        while let Some(frame) = ws_rx.next().await {
            let msg = match frame {
                Ok(msg) => msg,
                Err(error) => {
                    tracing::debug!(client_id = %reader_cid, %error, "WebSocket read error");
                    break;
                }
            };
            match msg {
                WsMessage::Text(text) => {
                    if on_message
                        .send((reader_cid.clone(), text.as_str().to_owned()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                WsMessage::Pong(_) => reader_registry.record_pong(&reader_cid),
                WsMessage::Close(_) => break,
                WsMessage::Binary(data) => {
                    tracing::debug!(client_id = %reader_cid, len = data.len(), "Ignoring binary frame");
                }
                WsMessage::Ping(_) => {} // answered by axum
            }
        }
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }
}

/// Periodically remove dead clients.
pub fn start_cleanup_task(
    registry: Arc<ClientRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            let _ = ticker.tick().await;
            let removed = registry.cleanup_dead_clients();
            if removed > 0 {
                tracing::info!(removed, "Dead client cleanup");
            }
        }
    })
}
