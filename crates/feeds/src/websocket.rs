//! WebSocket JSON-RPC client.
//!
//! One socket carries both request/response traffic and subscription pushes.
//! A background reader task owns the read half: responses are routed to the
//! waiting request by id, everything else is queued for `recv()`. The reader
//! also keeps the connection alive with protocol-level PING/PONG and exits
//! when no PONG arrives in time, which surfaces to the consumer as `recv()`
//! returning `None`.

use crate::{BlockStreamSource, Incoming, JsonRpcRequest, RpcConfig, RpcError};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = Arc<Mutex<SplitSink<WsStream, Message>>>;
type PendingMap = Arc<DashMap<u64, oneshot::Sender<Result<Value, RpcError>>>>;

/// Live socket state; replaced wholesale on reconnect.
struct Connection {
    writer: WsWriter,
    pending: PendingMap,
    reader: JoinHandle<()>,
}

impl Connection {
    fn is_alive(&self) -> bool {
        !self.reader.is_finished()
    }
}

/// JSON-RPC client over a single WebSocket connection.
pub struct WsRpcClient {
    config: RpcConfig,
    next_id: AtomicU64,
    conn: Mutex<Option<Connection>>,
    notifications: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
}

impl WsRpcClient {
    /// Create a client. No connection is made until `connect`.
    ///
    /// Requests never open a connection themselves: a socket that died
    /// mid-block fails the remaining calls with `NotConnected` until the
    /// caller reconnects and re-subscribes.
    pub fn new(config: RpcConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
            conn: Mutex::new(None),
            notifications: Mutex::new(None),
        }
    }

    /// True while the socket is open and its reader is running.
    pub async fn is_connected(&self) -> bool {
        self.conn
            .lock()
            .await
            .as_ref()
            .map(Connection::is_alive)
            .unwrap_or(false)
    }
}

#[async_trait]
impl BlockStreamSource for WsRpcClient {
    async fn connect(&self) -> Result<(), RpcError> {
        let mut conn = self.conn.lock().await;
        if conn.as_ref().map(Connection::is_alive).unwrap_or(false) {
            return Ok(());
        }
        if let Some(stale) = conn.take() {
            stale.reader.abort();
        }

        let url = Url::parse(&self.config.ws_url)?;
        debug!("Connecting to {}", url);
        let (ws_stream, response) =
            tokio::time::timeout(self.config.connect_timeout(), connect_async(url.as_str()))
                .await
                .map_err(|_| {
                    RpcError::Timeout(format!("connect after {:?}", self.config.connect_timeout()))
                })??;
        debug!("Connected (status: {:?})", response.status());

        let (write, read) = ws_stream.split();
        let writer: WsWriter = Arc::new(Mutex::new(write));
        let pending: PendingMap = Arc::new(DashMap::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(
            read,
            writer.clone(),
            pending.clone(),
            tx,
            self.config.ping_interval(),
            self.config.pong_timeout(),
        ));

        *conn = Some(Connection {
            writer,
            pending,
            reader,
        });
        *self.notifications.lock().await = Some(rx);

        info!("WebSocket connected to {}", self.config.ws_url);
        Ok(())
    }

    async fn close(&self) {
        let Some(conn) = self.conn.lock().await.take() else {
            return;
        };
        if let Err(e) = conn.writer.lock().await.send(Message::Close(None)).await {
            debug!("Close frame not sent: {}", e);
        }
        conn.reader.abort();
        conn.pending.clear();
        debug!("WebSocket closed");
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::to_string(&JsonRpcRequest::new(id, method, &params))?;
        let (tx, rx) = oneshot::channel();

        let (writer, pending) = {
            let guard = self.conn.lock().await;
            let conn = guard
                .as_ref()
                .filter(|c| c.is_alive())
                .ok_or(RpcError::NotConnected)?;
            conn.pending.insert(id, tx);
            (conn.writer.clone(), conn.pending.clone())
        };

        if let Err(e) = writer.lock().await.send(Message::Text(payload)).await {
            pending.remove(&id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.config.request_timeout(), rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(RpcError::Disconnected(format!(
                "connection closed before {} response",
                method
            ))),
            Err(_) => {
                pending.remove(&id);
                Err(RpcError::Timeout(format!(
                    "{} after {:?}",
                    method,
                    self.config.request_timeout()
                )))
            }
        }
    }

    async fn subscribe_new_heads(&self) -> Result<String, RpcError> {
        let result = self.request("eth_subscribe", json!(["newHeads"])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::ParseError(format!("unexpected subscription id: {}", result)))
    }

    async fn recv(&self) -> Option<Value> {
        let mut guard = self.notifications.lock().await;
        let rx = guard.as_mut()?;
        match rx.recv().await {
            Some(value) => Some(value),
            None => {
                *guard = None;
                None
            }
        }
    }
}

/// Owns the read half of the socket until it fails, closes, or stops answering pings.
async fn read_loop(
    mut read: SplitStream<WsStream>,
    writer: WsWriter,
    pending: PendingMap,
    notifications: mpsc::UnboundedSender<Value>,
    ping_interval: Duration,
    pong_timeout: Duration,
) {
    let mut ping_timer = tokio::time::interval(ping_interval);
    // First tick completes immediately.
    ping_timer.tick().await;
    let mut ping_sent: Option<Instant> = None;

    loop {
        if let Some(sent) = ping_sent {
            if sent.elapsed() > pong_timeout {
                warn!("No PONG received for {:?} after PING, dropping connection", sent.elapsed());
                break;
            }
        }

        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !route(&text, &pending, &notifications) {
                            debug!("Notification receiver dropped, stopping reader");
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => {
                            if !route(&text, &pending, &notifications) {
                                break;
                            }
                        }
                        Err(_) => debug!("Ignoring non-UTF8 binary frame"),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = writer.lock().await.send(Message::Pong(data)).await {
                            error!("Failed to send PONG: {}", e);
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        ping_sent = None;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Received close frame: {:?}", frame);
                        break;
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        error!("WebSocket read error: {}", e);
                        break;
                    }
                    None => {
                        warn!("WebSocket stream ended");
                        break;
                    }
                }
            }
            _ = ping_timer.tick() => {
                if let Err(e) = writer.lock().await.send(Message::Ping(Vec::new())).await {
                    error!("Failed to send PING: {}", e);
                    break;
                }
                ping_sent.get_or_insert_with(Instant::now);
            }
        }
    }

    // Dropping the senders fails every in-flight request with `Disconnected`.
    pending.clear();
}

/// Deliver one text frame. Returns false once nobody is listening for notifications.
fn route(
    text: &str,
    pending: &PendingMap,
    notifications: &mpsc::UnboundedSender<Value>,
) -> bool {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!("Ignoring unparseable frame: {}", e);
            return true;
        }
    };

    match Incoming::classify(value) {
        Incoming::Response { id, outcome } => {
            match pending.remove(&id) {
                Some((_, waiter)) => {
                    let _ = waiter.send(outcome);
                }
                None => debug!("Response for unknown request id {}", id),
            }
            true
        }
        Incoming::Notification(value) => notifications.send(value).is_ok(),
    }
}
