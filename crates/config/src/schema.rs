/// Config schema types (server, webhook, delivery, session, metrics).
use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    pub delivery: DeliveryConfig,
    pub session: SessionConfig,
    pub metrics: MetricsConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on. Defaults to 3002.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3002,
        }
    }
}

/// Downstream webhook (n8n workflow) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Destination for every normalized inbound event.
    pub url: Option<String>,
    /// Accepted for compatibility with older deployments but never delivered
    /// to. Events go to `url` only.
    pub secondary_url: Option<String>,
    /// Upper bound for a single delivery attempt.
    pub request_timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            secondary_url: None,
            request_timeout_secs: 15,
        }
    }
}

impl WebhookConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Retry and pacing for the delivery worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Attempts per record, including the first one.
    pub max_attempts: u32,
    /// Backoff after failed attempt `i` is `backoff_base_secs ^ i` seconds.
    pub backoff_base_secs: u64,
    /// Pause between two records while the queue is non-empty.
    pub inter_record_delay_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_secs: 2,
            inter_record_delay_secs: 2,
        }
    }
}

/// WhatsApp Web session (sidecar) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session name passed to the sidecar; also names the auth folder.
    pub name: String,
    /// Port the sidecar WebSocket server listens on.
    pub sidecar_port: u16,
    /// Directory containing the sidecar's `package.json`.
    pub sidecar_dir: Option<PathBuf>,
    /// Where the sidecar stores session tokens.
    pub auth_dir: Option<PathBuf>,
    /// Spawn and supervise the sidecar process. Disable to connect to a
    /// sidecar started by other means.
    pub auto_start_sidecar: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "n8n-whatsapp-bot".into(),
            sidecar_port: 3003,
            sidecar_dir: None,
            auth_dir: None,
            auto_start_sidecar: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
