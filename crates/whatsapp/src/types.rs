//! Wire protocol between the relay and the sidecar.
//!
//! One JSON object per WebSocket text frame, discriminated by `type`.

use serde::{Deserialize, Serialize};

use relay_channels::{InboundMessage, QrCode};

/// Relay -> sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    /// Open (or resume) the named session. Triggers QR events until linked.
    Login {
        session: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        auth_dir: Option<String>,
    },
    Logout {
        session: String,
    },
    SendText {
        request_id: String,
        session: String,
        to: String,
        text: String,
    },
    /// `file_path` is read by the sidecar; it may also be a URL.
    SendFile {
        request_id: String,
        session: String,
        to: String,
        file_path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    /// Download and decrypt the media attached to an inbound message.
    DownloadMedia {
        request_id: String,
        session: String,
        message_id: String,
    },
}

impl GatewayMessage {
    /// Correlation id for messages that expect a reply.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::SendText { request_id, .. }
            | Self::SendFile { request_id, .. }
            | Self::DownloadMedia { request_id, .. } => Some(request_id),
            Self::Login { .. } | Self::Logout { .. } => None,
        }
    }
}

/// Sidecar -> relay.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarMessage {
    Qr {
        session: String,
        qr: QrCode,
    },
    Connected {
        session: String,
        #[serde(default)]
        phone_number: Option<String>,
    },
    Disconnected {
        session: String,
        #[serde(default)]
        reason: Option<String>,
    },
    LoggedOut {
        session: String,
    },
    InboundMessage {
        session: String,
        message: InboundMessage,
    },
    SendResult {
        request_id: String,
        success: bool,
        #[serde(default)]
        message_id: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    MediaResult {
        request_id: String,
        success: bool,
        /// Base64 of the decrypted bytes.
        #[serde(default)]
        data: Option<String>,
        #[serde(default)]
        mime_type: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    Error {
        #[serde(default)]
        session: Option<String>,
        error: String,
    },
}

impl SidecarMessage {
    /// Correlation id if this is a reply to a request.
    #[must_use]
    pub fn reply_to(&self) -> Option<&str> {
        match self {
            Self::SendResult { request_id, .. } | Self::MediaResult { request_id, .. } => {
                Some(request_id)
            },
            _ => None,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_omits_missing_auth_dir() {
        let json = serde_json::to_value(GatewayMessage::Login {
            session: "n8n-whatsapp-bot".into(),
            auth_dir: None,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "login", "session": "n8n-whatsapp-bot" })
        );
    }

    #[test]
    fn send_file_carries_request_id() {
        let msg = GatewayMessage::SendFile {
            request_id: "r-1".into(),
            session: "s".into(),
            to: "15550001111@c.us".into(),
            file_path: "/tmp/report.pdf".into(),
            caption: Some("monthly".into()),
        };
        assert_eq!(msg.request_id(), Some("r-1"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "send_file");
        assert_eq!(json["file_path"], "/tmp/report.pdf");
    }

    #[test]
    fn parses_qr_event() {
        let msg: SidecarMessage = serde_json::from_str(
            r###"{"type":"qr","session":"s","qr":{"base64":"data:image/png;base64,AAA","ascii":"##","url":"2@abc","attempts":1}}"###,
        )
        .unwrap();
        match msg {
            SidecarMessage::Qr { qr, .. } => {
                assert_eq!(qr.url, "2@abc");
                assert_eq!(qr.attempts, 1);
            },
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parses_inbound_message() {
        let msg: SidecarMessage = serde_json::from_str(
            r#"{"type":"inbound_message","session":"s","message":{
                "id":"false_15550001111@c.us_ABC","from":"15550001111@c.us",
                "fromMe":false,"isGroup":false,"type":"image",
                "body":"look","mimeType":"image/jpeg","timestamp":1700000000}}"#,
        )
        .unwrap();
        let SidecarMessage::InboundMessage { message, .. } = msg else {
            panic!("expected inbound message");
        };
        assert_eq!(message.message_type, "image");
        assert_eq!(message.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(message.timestamp, 1_700_000_000);
    }

    #[test]
    fn replies_expose_correlation_id() {
        let msg: SidecarMessage = serde_json::from_str(
            r#"{"type":"media_result","request_id":"r-9","success":false,"error":"gone"}"#,
        )
        .unwrap();
        assert_eq!(msg.reply_to(), Some("r-9"));

        let msg: SidecarMessage =
            serde_json::from_str(r#"{"type":"logged_out","session":"s"}"#).unwrap();
        assert_eq!(msg.reply_to(), None);
    }
}
