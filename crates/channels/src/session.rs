use {async_trait::async_trait, serde::Serialize};

use crate::{Result, message::InboundMessage};

/// QR code emitted while the session waits to be linked to a phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct QrCode {
    /// Base64 PNG data URL of the QR image.
    pub base64: String,
    /// Terminal-printable rendering.
    pub ascii: String,
    /// Raw pairing payload encoded in the QR.
    pub url: String,
    /// How many codes have been generated for this login attempt.
    pub attempts: u32,
}

/// Receipt returned by the session after a successful send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Decrypted media content fetched from the session.
#[derive(Debug, Clone)]
pub struct MediaContent {
    pub data: Vec<u8>,
    /// Mime type reported by the download, when it differs from or fills in
    /// the one announced on the message.
    pub mime_type: Option<String>,
}

/// Session health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SessionHealthSnapshot {
    pub connected: bool,
    pub details: Option<String>,
}

/// Send messages through the session.
#[async_trait]
pub trait SessionOutbound: Send + Sync {
    async fn send_text(&self, to: &str, text: &str) -> Result<SendReceipt>;

    /// Send a file from a path (or URL) the session process can read.
    async fn send_file(
        &self,
        to: &str,
        file_path: &str,
        caption: Option<&str>,
    ) -> Result<SendReceipt>;
}

/// Observe the session's login state.
#[async_trait]
pub trait SessionStatus: Send + Sync {
    /// Whether the session is logged in and able to send.
    async fn is_connected(&self) -> bool;

    /// The current QR code, if the session is waiting for a scan.
    fn qr_code(&self) -> Option<QrCode>;

    async fn probe(&self) -> SessionHealthSnapshot;
}

/// Download and decrypt the binary content of a media message.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch_media(&self, message: &InboundMessage) -> Result<MediaContent>;
}
