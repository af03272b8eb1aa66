//! WebSocket client for the sidecar.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    anyhow::{Context, Result},
    futures::{SinkExt, StreamExt},
    tokio::sync::{mpsc, oneshot},
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, info, warn},
};

use relay_channels::Error as SessionError;

use crate::types::{GatewayMessage, SidecarMessage};

/// Port the sidecar listens on unless configured otherwise.
pub const DEFAULT_SIDECAR_PORT: u16 = 3003;

/// Delay between connection attempts while the sidecar is starting.
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Receives every sidecar message that is not a reply to a pending request.
pub type MessageCallback = Arc<dyn Fn(SidecarMessage) + Send + Sync>;

type Pending = HashMap<String, oneshot::Sender<SidecarMessage>>;
type PendingMap = Arc<Mutex<Pending>>;

/// Cloneable handle to a live sidecar connection.
#[derive(Clone)]
pub struct SidecarHandle {
    write_tx: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
    pending: PendingMap,
}

impl SidecarHandle {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Fire-and-forget send.
    pub fn send(&self, message: &GatewayMessage) -> relay_channels::Result<()> {
        if !self.is_connected() {
            return Err(SessionError::unavailable("sidecar connection is closed"));
        }
        let json = serde_json::to_string(message)?;
        self.write_tx
            .send(json)
            .map_err(|_| SessionError::unavailable("sidecar connection is closed"))
    }

    /// Send a request and wait for the reply carrying its request id.
    pub async fn request(
        &self,
        message: GatewayMessage,
        timeout: Duration,
        operation: &str,
    ) -> relay_channels::Result<SidecarMessage> {
        let Some(request_id) = message.request_id().map(str::to_string) else {
            return Err(SessionError::invalid_input(format!(
                "{operation} is not a request message"
            )));
        };

        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(request_id.clone(), tx);

        if let Err(e) = self.send(&message) {
            self.lock_pending().remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(SessionError::unavailable(format!(
                "sidecar connection closed during {operation}"
            ))),
            Err(_) => {
                self.lock_pending().remove(&request_id);
                Err(SessionError::timeout(operation, timeout))
            },
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fresh correlation id for a request.
#[must_use]
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Connect once. The returned receiver resolves when the connection ends.
pub async fn connect(
    port: u16,
    callback: MessageCallback,
) -> Result<(SidecarHandle, oneshot::Receiver<()>)> {
    let url = format!("ws://127.0.0.1:{port}");
    let (stream, _response) = connect_async(&url)
        .await
        .with_context(|| format!("failed to connect to sidecar at {url}"))?;
    info!(%url, "connected to WhatsApp sidecar");

    let (mut sink, mut reader) = stream.split();
    let (write_tx, mut write_rx) = mpsc::unbounded_channel::<String>();
    let (closed_tx, closed_rx) = oneshot::channel();
    let connected = Arc::new(AtomicBool::new(true));
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

    tokio::spawn(async move {
        while let Some(json) = write_rx.recv().await {
            if let Err(e) = sink.send(Message::Text(json.into())).await {
                warn!(error = %e, "failed to write to sidecar");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let handle = SidecarHandle {
        write_tx,
        connected: Arc::clone(&connected),
        pending: Arc::clone(&pending),
    };

    tokio::spawn(async move {
        while let Some(frame) = reader.next().await {
            match frame {
                Ok(Message::Text(text)) => dispatch(text.as_str(), &pending, &callback),
                Ok(Message::Close(_)) => break,
                Ok(_) => {},
                Err(e) => {
                    warn!(error = %e, "sidecar connection error");
                    break;
                },
            }
        }
        connected.store(false, Ordering::SeqCst);
        // Dropping the senders fails every in-flight request.
        pending.lock().unwrap_or_else(|e| e.into_inner()).clear();
        warn!("sidecar connection closed");
        let _ = closed_tx.send(());
    });

    Ok((handle, closed_rx))
}

/// Connect, retrying while the sidecar process is still starting.
pub async fn connect_with_retry(
    port: u16,
    callback: MessageCallback,
    max_retries: u32,
) -> Result<(SidecarHandle, oneshot::Receiver<()>)> {
    let mut attempt = 0;
    loop {
        match connect(port, Arc::clone(&callback)).await {
            Ok(connection) => return Ok(connection),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                debug!(
                    port,
                    attempt,
                    max_retries,
                    error = %e,
                    "sidecar not reachable yet, retrying"
                );
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            },
            Err(e) => return Err(e),
        }
    }
}

fn dispatch(text: &str, pending: &PendingMap, callback: &MessageCallback) {
    let message = match serde_json::from_str::<SidecarMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "ignoring malformed sidecar frame");
            return;
        },
    };

    if let Some(request_id) = message.reply_to().map(str::to_string) {
        let waiter = pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&request_id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(message);
            },
            None => debug!(%request_id, "reply for unknown or expired request"),
        }
        return;
    }

    callback(message);
}
