/// Crate-wide result type for delivery setup.
///
/// Delivery itself never fails outward: per-record failures end as a
/// [`crate::RecordFate`] and a log line.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid webhook URL {url:?}: {reason}")]
    InvalidWebhookUrl { url: String, reason: String },

    #[error("failed to build webhook HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("no webhook URL configured")]
    MissingWebhookUrl,
}
