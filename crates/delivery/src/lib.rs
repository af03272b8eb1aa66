//! Inbound event delivery pipeline.
//!
//! Raw session messages are normalized into [`NormalizedEvent`]s, appended to
//! a FIFO [`DeliveryQueue`], and drained by a single worker cycle that posts
//! each record to the configured webhook with bounded exponential backoff.
//! At most one record is ever in flight.

pub mod error;
pub mod event;
pub mod normalize;
pub mod queue;
pub mod relay;
pub mod retry;
pub mod sender;
pub mod status;
mod worker;

pub use {
    error::{Error, Result},
    event::{EventKind, MediaPayload, NormalizedEvent, QueueRecord, RecordId, WebhookPayload},
    normalize::{MEDIA_DOWNLOAD_FAILED, Normalizer},
    queue::{DeliveryQueue, WorkerState},
    relay::Relay,
    retry::RetryPolicy,
    sender::{DeliveryOutcome, HttpWebhookSender, WebhookSender},
    status::{QueueStatus, StatusReporter},
    worker::RecordFate,
};
