//! Glue between the session's inbound channel and the delivery queue.

use std::sync::Arc;

use {
    tokio::task::JoinHandle,
    tracing::{debug, info},
};

use relay_channels::{InboundMessage, InboundReceiver, MediaFetcher};

#[cfg(feature = "metrics")]
use relay_metrics::{counter, inbound as inbound_metrics, labels};

use crate::{
    event::RecordId,
    normalize::{Normalizer, needs_media_fetch},
    queue::DeliveryQueue,
};

/// Owns the normalizer and the queue for the lifetime of the process.
pub struct Relay {
    normalizer: Normalizer,
    queue: Arc<DeliveryQueue>,
}

impl Relay {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, queue: Arc<DeliveryQueue>) -> Arc<Self> {
        Arc::new(Self {
            normalizer: Normalizer::new(fetcher),
            queue,
        })
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<DeliveryQueue> {
        &self.queue
    }

    /// Normalize one message and enqueue it. `None` if it was ignored.
    pub async fn ingest(&self, message: InboundMessage) -> Option<RecordId> {
        #[cfg(feature = "metrics")]
        {
            counter!(inbound_metrics::MESSAGES_RECEIVED_TOTAL, labels::MESSAGE_TYPE => message.message_type.clone())
                .increment(1);
            if let Some(reason) = crate::normalize::ignore_reason(&message) {
                counter!(inbound_metrics::MESSAGES_IGNORED_TOTAL, labels::REASON => format!("{reason:?}"))
                    .increment(1);
            }
        }

        let arrived_at = relay_common::time::unix_now();
        let event = self.normalizer.normalize(message, arrived_at).await?;
        let message_id = event.id.clone();
        let record_id = self.queue.enqueue(event);
        debug!(%message_id, %record_id, "inbound message queued");
        Some(record_id)
    }

    /// Consume the inbound channel until the session drops its sender.
    ///
    /// Messages that need no download are ingested inline, which keeps
    /// their enqueue order equal to arrival order. Media messages are
    /// ingested on their own task so a slow download does not hold up the
    /// messages behind it.
    pub fn spawn(self: &Arc<Self>, mut inbound: InboundReceiver) -> JoinHandle<()> {
        let relay = Arc::clone(self);
        tokio::spawn(async move {
            info!("inbound relay started");
            while let Some(message) = inbound.recv().await {
                if needs_media_fetch(&message) {
                    let relay = Arc::clone(&relay);
                    tokio::spawn(async move {
                        relay.ingest(message).await;
                    });
                } else {
                    relay.ingest(message).await;
                }
            }
            info!("inbound channel closed, relay stopped");
        })
    }
}
