//! Webhook sender: one POST per call, outcome classified for the worker.

use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::{StatusCode, Url},
    tracing::debug,
};

use relay_config::WebhookConfig;

use crate::{
    error::{Error, Result},
    event::{QueueRecord, WebhookPayload},
};

/// Response bodies are cut to this many characters in failure reasons.
const MAX_REASON_BODY_CHARS: usize = 512;

/// Result of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Transport error, timeout, or a status that may change on retry.
    RetryableFailure(String),
    /// The webhook rejected the payload itself; retrying cannot help.
    TerminalFailure(String),
}

/// Performs exactly one delivery attempt per call.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, record: &QueueRecord) -> DeliveryOutcome;
}

/// Posts records as JSON to a single webhook URL.
pub struct HttpWebhookSender {
    client: reqwest::Client,
    url: Url,
}

impl HttpWebhookSender {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::InvalidWebhookUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidWebhookUrl {
                url: url.to_string(),
                reason: "scheme must be http or https".into(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wa-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Client)?;
        Ok(Self { client, url })
    }

    /// Build from the `[webhook]` config section. Only `url` is used.
    pub fn from_config(config: &WebhookConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(Error::MissingWebhookUrl)?;
        Self::new(url, config.request_timeout())
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, record: &QueueRecord) -> DeliveryOutcome {
        let payload = WebhookPayload::from(record);
        debug!(record_id = %record.id, message_id = %record.event.id, "posting record to webhook");

        let response = match self.client.post(self.url.clone()).json(&payload).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return DeliveryOutcome::TerminalFailure(format!("could not build request: {e}"));
            },
            Err(e) if e.is_timeout() => {
                return DeliveryOutcome::RetryableFailure(format!("request timed out: {e}"));
            },
            Err(e) => return DeliveryOutcome::RetryableFailure(format!("transport error: {e}")),
        };

        let status = response.status();
        if status.is_success() {
            return DeliveryOutcome::Delivered;
        }

        let body = response.text().await.unwrap_or_default();
        let reason = format!("HTTP {status}: {}", truncate(body.trim(), MAX_REASON_BODY_CHARS));
        if is_terminal_status(status) {
            DeliveryOutcome::TerminalFailure(reason)
        } else {
            DeliveryOutcome::RetryableFailure(reason)
        }
    }
}

/// Statuses that mean the payload itself was refused.
fn is_terminal_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST
            | StatusCode::PAYLOAD_TOO_LARGE
            | StatusCode::UNSUPPORTED_MEDIA_TYPE
            | StatusCode::UNPROCESSABLE_ENTITY
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
