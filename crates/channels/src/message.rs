use {
    serde::{Deserialize, Serialize},
    tokio::sync::mpsc,
};

/// A raw inbound chat message as reported by the session, before any
/// filtering or normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Upstream message id.
    pub id: String,
    /// Sender handle, e.g. `919319338997@c.us`.
    pub from: String,
    /// Sent by the logged-in account itself.
    #[serde(default)]
    pub from_me: bool,
    /// Posted in a group conversation.
    #[serde(default)]
    pub is_group: bool,
    /// Upstream message type: `chat`, `image`, `ptt`, `protocol`, ...
    #[serde(rename = "type")]
    pub message_type: String,
    /// Text content, or the caption for media messages.
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Upstream timestamp, unix seconds.
    #[serde(default)]
    pub timestamp: i64,
}

impl InboundMessage {
    /// Body text if present and non-empty.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.is_empty())
    }
}

/// Producer side of the inbound channel, held by the session.
pub type InboundSender = mpsc::UnboundedSender<InboundMessage>;

/// Consumer side of the inbound channel, drained by the relay.
pub type InboundReceiver = mpsc::UnboundedReceiver<InboundMessage>;

/// Create the channel the session pushes arriving messages into.
///
/// Unbounded so that a slow consumer never applies backpressure to the
/// session's event loop.
#[must_use]
pub fn inbound_channel() -> (InboundSender, InboundReceiver) {
    mpsc::unbounded_channel()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_sidecar_shape() {
        let msg: InboundMessage = serde_json::from_value(serde_json::json!({
            "id": "false_919319338997@c.us_3EB0",
            "from": "919319338997@c.us",
            "type": "image",
            "body": "look at this",
            "mimeType": "image/jpeg",
            "timestamp": 1_700_000_000
        }))
        .unwrap();
        assert_eq!(msg.message_type, "image");
        assert!(!msg.from_me);
        assert!(!msg.is_group);
        assert_eq!(msg.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(msg.text(), Some("look at this"));
    }

    #[test]
    fn empty_body_is_no_text() {
        let msg = InboundMessage {
            body: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(msg.text(), None);
    }
}
