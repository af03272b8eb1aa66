//! Raw session message -> [`NormalizedEvent`].

use std::sync::Arc;

use tracing::{debug, warn};

use relay_channels::{InboundMessage, MediaFetcher};

#[cfg(feature = "metrics")]
use relay_metrics::{counter, inbound as inbound_metrics};

use crate::event::{EventKind, MediaPayload, NormalizedEvent};

/// Body used when a media message could not be downloaded and had no caption.
pub const MEDIA_DOWNLOAD_FAILED: &str = "Media download failed.";

const TEXT_TYPES: &[&str] = &["chat", "ptt", "vcard", "location", "sticker"];
const MEDIA_TYPES: &[&str] = &["image", "video", "document", "audio"];
const CONTROL_TYPES: &[&str] = &["protocol", "notification_code"];

/// Why a message produced no event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    FromSelf,
    Group,
    Control,
}

/// Decide whether a message is dropped before normalization.
#[must_use]
pub fn ignore_reason(message: &InboundMessage) -> Option<IgnoreReason> {
    if message.from_me {
        Some(IgnoreReason::FromSelf)
    } else if message.is_group {
        Some(IgnoreReason::Group)
    } else if CONTROL_TYPES.contains(&message.message_type.as_str()) {
        Some(IgnoreReason::Control)
    } else {
        None
    }
}

/// Classify an upstream message type.
#[must_use]
pub fn classify(message_type: &str) -> EventKind {
    if TEXT_TYPES.contains(&message_type) {
        EventKind::Text
    } else if MEDIA_TYPES.contains(&message_type) {
        EventKind::Media
    } else {
        EventKind::Unhandled
    }
}

/// Whether normalizing this message has to wait on a media download.
#[must_use]
pub fn needs_media_fetch(message: &InboundMessage) -> bool {
    ignore_reason(message).is_none() && classify(&message.message_type) == EventKind::Media
}

/// File name for a media payload: the declared one, else synthesized from
/// the mime subtype (`image/jpeg` -> `media_file.jpeg`).
#[must_use]
pub fn media_file_name(declared: Option<&str>, mime_type: &str) -> String {
    if let Some(name) = declared.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    let subtype = mime_type
        .split_once('/')
        .map(|(_, sub)| sub.split(';').next().unwrap_or_default().trim())
        .filter(|sub| !sub.is_empty())
        .unwrap_or("dat");
    format!("media_file.{subtype}")
}

/// Turns session messages into events, downloading media on the way.
pub struct Normalizer {
    fetcher: Arc<dyn MediaFetcher>,
}

impl Normalizer {
    pub fn new(fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self { fetcher }
    }

    /// Produce the event for `message`, or `None` if it is ignorable.
    ///
    /// A failed media download degrades the event instead of dropping it.
    pub async fn normalize(
        &self,
        message: InboundMessage,
        arrived_at: i64,
    ) -> Option<NormalizedEvent> {
        if let Some(reason) = ignore_reason(&message) {
            debug!(message_id = %message.id, ?reason, "ignoring inbound message");
            return None;
        }

        let kind = classify(&message.message_type);
        let mut event = NormalizedEvent {
            id: message.id.clone(),
            from: message.from.clone(),
            message_type: message.message_type.clone(),
            kind,
            body: None,
            media: None,
            caption: None,
            original_timestamp: message.timestamp,
            arrived_at,
        };

        match kind {
            EventKind::Text => {
                event.body = message.body.clone();
            },
            EventKind::Media => match self.fetcher.fetch_media(&message).await {
                Ok(content) => {
                    let mime_type = content
                        .mime_type
                        .or_else(|| message.mime_type.clone())
                        .unwrap_or_else(|| "application/octet-stream".into());
                    let file_name = media_file_name(message.file_name.as_deref(), &mime_type);
                    debug!(
                        message_id = %message.id,
                        mime_type = %mime_type,
                        bytes = content.data.len(),
                        "media downloaded"
                    );
                    event.media = Some(MediaPayload {
                        data: content.data,
                        mime_type,
                        file_name,
                    });
                    event.caption = Some(message.body.clone().unwrap_or_default());
                },
                Err(e) => {
                    warn!(
                        message_id = %message.id,
                        message_type = %message.message_type,
                        error = %e,
                        "media download failed, forwarding without attachment"
                    );
                    #[cfg(feature = "metrics")]
                    counter!(inbound_metrics::MEDIA_DOWNLOAD_ERRORS_TOTAL).increment(1);
                    event.body = Some(
                        message
                            .text()
                            .map_or_else(|| MEDIA_DOWNLOAD_FAILED.to_string(), str::to_string),
                    );
                },
            },
            EventKind::Unhandled => {
                debug!(message_type = %message.message_type, "unhandled message type");
                event.body = Some(message.text().map_or_else(
                    || format!("Unhandled message type: {}", message.message_type),
                    str::to_string,
                ));
            },
        }

        Some(event)
    }
}
