//! The WhatsApp session as seen by the rest of the relay.

use std::{
    sync::{Arc, RwLock as StdRwLock},
    time::Duration,
};

use {
    anyhow::Result,
    async_trait::async_trait,
    base64::Engine,
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

use {
    relay_channels::{
        Error as SessionError, InboundMessage, InboundSender, MediaContent, MediaFetcher, QrCode,
        SendReceipt, SessionHealthSnapshot, SessionOutbound, SessionStatus,
    },
    relay_config::SessionConfig,
};

use crate::{
    process::{SidecarConfig, SidecarProcess, start_sidecar},
    sidecar::{MessageCallback, SidecarHandle, connect_with_retry, new_request_id},
    state::{ConnectionState, SessionState},
    types::{GatewayMessage, SidecarMessage},
};

/// Connection attempts while a freshly spawned sidecar boots.
const CONNECT_RETRIES: u32 = 20;
const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const MEDIA_TIMEOUT: Duration = Duration::from_secs(60);

/// A single named WhatsApp Web session.
pub struct WhatsAppSession {
    config: SessionConfig,
    state: SessionState,
    inbound: InboundSender,
    sidecar: Arc<StdRwLock<Option<SidecarHandle>>>,
    process: Mutex<Option<SidecarProcess>>,
    send_timeout: Duration,
    media_timeout: Duration,
}

impl WhatsAppSession {
    /// Arriving messages are pushed into `inbound`.
    pub fn new(config: SessionConfig, inbound: InboundSender) -> Self {
        Self {
            state: SessionState::new(config.name.clone()),
            config,
            inbound,
            sidecar: Arc::new(StdRwLock::new(None)),
            process: Mutex::new(None),
            send_timeout: SEND_TIMEOUT,
            media_timeout: MEDIA_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_request_timeouts(mut self, send: Duration, media: Duration) -> Self {
        self.send_timeout = send;
        self.media_timeout = media;
        self
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Start the sidecar if configured to, connect, and log in.
    ///
    /// Returns once the login request is sent; the QR code and the logged-in
    /// state arrive asynchronously.
    pub async fn start(&self) -> Result<()> {
        if self.config.auto_start_sidecar {
            self.ensure_process_running().await?;
        }

        let callback: MessageCallback = {
            let state = self.state.clone();
            let inbound = self.inbound.clone();
            Arc::new(move |msg| handle_sidecar_message(msg, &state, &inbound))
        };
        let (handle, closed) =
            connect_with_retry(self.config.sidecar_port, callback, CONNECT_RETRIES).await?;

        // Set before sending: the sidecar may answer with `connected` at once.
        self.state.set(ConnectionState::WaitingForQr);
        handle.send(&GatewayMessage::Login {
            session: self.config.name.clone(),
            auth_dir: self
                .config
                .auth_dir
                .as_ref()
                .map(|p| p.display().to_string()),
        })?;
        *self.sidecar.write().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!(session = %self.config.name, "login requested");

        let state = self.state.clone();
        tokio::spawn(async move {
            let _ = closed.await;
            state.set(ConnectionState::Disconnected);
        });
        Ok(())
    }

    /// Log out, disconnect, and stop a sidecar this session started.
    pub async fn stop(&self) -> Result<()> {
        let handle = self
            .sidecar
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.send(&GatewayMessage::Logout {
                session: self.config.name.clone(),
            });
        }
        self.state.set(ConnectionState::Disconnected);

        if let Some(mut process) = self.process.lock().await.take() {
            process.stop().await?;
        }
        Ok(())
    }

    async fn ensure_process_running(&self) -> Result<()> {
        let mut process = self.process.lock().await;
        if let Some(running) = process.as_mut() {
            if running.is_running() {
                return Ok(());
            }
            warn!("sidecar process died, restarting");
        }
        let config = SidecarConfig::from_session(&self.config)?;
        *process = Some(start_sidecar(config).await?);
        Ok(())
    }

    /// The live connection, if the session is logged in.
    fn ready_handle(&self) -> relay_channels::Result<SidecarHandle> {
        if !self.state.get().is_connected() {
            return Err(SessionError::unavailable("session is not logged in"));
        }
        self.sidecar
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .filter(SidecarHandle::is_connected)
            .ok_or_else(|| SessionError::unavailable("sidecar is not connected"))
    }

    async fn send(
        &self,
        to: &str,
        request: GatewayMessage,
        operation: &str,
    ) -> relay_channels::Result<SendReceipt> {
        let handle = self.ready_handle()?;
        match handle.request(request, self.send_timeout, operation).await? {
            SidecarMessage::SendResult {
                success: true,
                message_id,
                ..
            } => Ok(SendReceipt {
                to: to.to_string(),
                message_id,
            }),
            SidecarMessage::SendResult { error, .. } => Err(SessionError::rejected(
                operation,
                error.unwrap_or_else(|| "unknown error".into()),
            )),
            other => Err(SessionError::rejected(
                operation,
                format!("unexpected reply: {other:?}"),
            )),
        }
    }
}

#[async_trait]
impl SessionOutbound for WhatsAppSession {
    async fn send_text(&self, to: &str, text: &str) -> relay_channels::Result<SendReceipt> {
        let request = GatewayMessage::SendText {
            request_id: new_request_id(),
            session: self.config.name.clone(),
            to: to.to_string(),
            text: text.to_string(),
        };
        self.send(to, request, "send text").await
    }

    async fn send_file(
        &self,
        to: &str,
        file_path: &str,
        caption: Option<&str>,
    ) -> relay_channels::Result<SendReceipt> {
        let request = GatewayMessage::SendFile {
            request_id: new_request_id(),
            session: self.config.name.clone(),
            to: to.to_string(),
            file_path: file_path.to_string(),
            caption: caption.map(str::to_string),
        };
        self.send(to, request, "send file").await
    }
}

#[async_trait]
impl SessionStatus for WhatsAppSession {
    async fn is_connected(&self) -> bool {
        self.ready_handle().is_ok()
    }

    fn qr_code(&self) -> Option<QrCode> {
        self.state.get().qr_code().cloned()
    }

    async fn probe(&self) -> SessionHealthSnapshot {
        self.state.get().health()
    }
}

#[async_trait]
impl MediaFetcher for WhatsAppSession {
    async fn fetch_media(&self, message: &InboundMessage) -> relay_channels::Result<MediaContent> {
        let handle = self.ready_handle()?;
        let request = GatewayMessage::DownloadMedia {
            request_id: new_request_id(),
            session: self.config.name.clone(),
            message_id: message.id.clone(),
        };
        match handle
            .request(request, self.media_timeout, "download media")
            .await?
        {
            SidecarMessage::MediaResult {
                success: true,
                data: Some(data),
                mime_type,
                ..
            } => {
                let data = base64::engine::general_purpose::STANDARD
                    .decode(data.as_bytes())
                    .map_err(|e| SessionError::external("decode media payload", e))?;
                debug!(message_id = %message.id, bytes = data.len(), "media downloaded");
                Ok(MediaContent { data, mime_type })
            },
            SidecarMessage::MediaResult { error, .. } => Err(SessionError::rejected(
                "download media",
                error.unwrap_or_else(|| "no data returned".into()),
            )),
            other => Err(SessionError::rejected(
                "download media",
                format!("unexpected reply: {other:?}"),
            )),
        }
    }
}

/// Route one unsolicited sidecar message.
fn handle_sidecar_message(msg: SidecarMessage, state: &SessionState, inbound: &InboundSender) {
    match msg {
        SidecarMessage::InboundMessage { session, message } => {
            if session != state.name() {
                debug!(%session, "inbound message for another session");
                return;
            }
            debug!(
                message_id = %message.id,
                from = %message.from,
                message_type = %message.message_type,
                "received inbound message"
            );
            if inbound.send(message).is_err() {
                warn!("inbound channel closed, dropping message");
            }
        },
        SidecarMessage::Error { session, error } => {
            warn!(?session, error = %error, "sidecar error");
        },
        other => {
            state.apply(&other);
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, relay_channels::inbound_channel};

    #[test]
    fn inbound_messages_go_to_the_channel() {
        let state = SessionState::new("bot");
        let (tx, mut rx) = inbound_channel();
        handle_sidecar_message(
            SidecarMessage::InboundMessage {
                session: "bot".into(),
                message: InboundMessage {
                    id: "m1".into(),
                    message_type: "chat".into(),
                    ..Default::default()
                },
            },
            &state,
            &tx,
        );
        assert_eq!(rx.try_recv().unwrap().id, "m1");
    }

    #[test]
    fn inbound_for_other_session_is_dropped() {
        let state = SessionState::new("bot");
        let (tx, mut rx) = inbound_channel();
        handle_sidecar_message(
            SidecarMessage::InboundMessage {
                session: "other".into(),
                message: InboundMessage::default(),
            },
            &state,
            &tx,
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn lifecycle_events_update_state() {
        let state = SessionState::new("bot");
        let (tx, _rx) = inbound_channel();
        handle_sidecar_message(
            SidecarMessage::Connected {
                session: "bot".into(),
                phone_number: None,
            },
            &state,
            &tx,
        );
        assert!(state.get().is_connected());
    }

    #[tokio::test]
    async fn sends_fail_fast_when_not_logged_in() {
        let (tx, _rx) = inbound_channel();
        let session = WhatsAppSession::new(SessionConfig::default(), tx);
        let err = session.send_text("15550001111@c.us", "hi").await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(!session.is_connected().await);
        assert!(session.qr_code().is_none());
    }
}
