use std::fmt;

use {base64::Engine, serde::Serialize};

/// What a normalized event carries as its primary content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Text-bearing types: chat, ptt, vcard, location, sticker.
    Text,
    /// Binary types: image, video, document, audio.
    Media,
    /// Anything the relay has no dedicated handling for.
    Unhandled,
}

/// Decrypted media attached to an event.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

impl fmt::Debug for MediaPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPayload")
            .field("bytes", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// Canonical form of one inbound chat message.
///
/// `kind` decides which optional fields are set: unhandled events always
/// carry `body`, text events carry it when upstream sent one; media events carry `media` plus `caption`, or, when the
/// download failed, `body` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    /// Upstream message id.
    pub id: String,
    /// Sender handle.
    pub from: String,
    /// Upstream message type, forwarded verbatim.
    pub message_type: String,
    pub kind: EventKind,
    pub body: Option<String>,
    pub media: Option<MediaPayload>,
    pub caption: Option<String>,
    /// Upstream timestamp, unix seconds.
    pub original_timestamp: i64,
    /// When the relay received the message, unix seconds.
    pub arrived_at: i64,
}

/// Queue-assigned identifier, increasing in enqueue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec-{}", self.0)
    }
}

/// An event waiting in, or taken from, the delivery queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRecord {
    pub id: RecordId,
    /// Unix seconds.
    pub enqueued_at: i64,
    pub event: NormalizedEvent,
}

/// JSON body posted to the webhook.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload<'a> {
    pub from: &'a str,
    pub id: &'a str,
    #[serde(rename = "type")]
    pub message_type: &'a str,
    pub timestamp: i64,
    pub original_timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<&'a str>,
}

impl<'a> From<&'a QueueRecord> for WebhookPayload<'a> {
    fn from(record: &'a QueueRecord) -> Self {
        let event = &record.event;
        let media = event.media.as_ref();
        Self {
            from: &event.from,
            id: &event.id,
            message_type: &event.message_type,
            timestamp: record.enqueued_at,
            original_timestamp: event.original_timestamp,
            body: event.body.as_deref(),
            media_base64: media.map(|m| base64::engine::general_purpose::STANDARD.encode(&m.data)),
            media_mime_type: media.map(|m| m.mime_type.as_str()),
            file_name: media.map(|m| m.file_name.as_str()),
            caption: event.caption.as_deref(),
        }
    }
}
