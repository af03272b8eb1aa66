//! The delivery cycle: drain the queue one record at a time.

use std::sync::Arc;

use tracing::{error, info, warn};

#[cfg(feature = "metrics")]
use {
    relay_metrics::{counter, delivery as delivery_metrics, histogram, labels},
    std::time::Instant,
};

use crate::{
    event::QueueRecord,
    queue::DeliveryQueue,
    retry::RetryPolicy,
    sender::{DeliveryOutcome, WebhookSender},
};

/// How delivery of one record ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFate {
    Delivered { attempts: u32 },
    /// The webhook refused the payload; remaining attempts were skipped.
    Rejected { attempts: u32, reason: String },
    /// Every attempt failed with a retryable error.
    Abandoned { attempts: u32, reason: String },
}

/// Run one delivery cycle. The caller has already moved the queue to
/// draining; this returns once it is back to idle.
pub(crate) async fn run_cycle(queue: Arc<DeliveryQueue>) {
    info!(queue_length = queue.len(), "delivery cycle started");
    let mut handled = 0usize;

    loop {
        let Some(record) = queue.dequeue() else {
            if queue.finish_or_resume_cycle() {
                continue;
            }
            break;
        };

        let fate = deliver(queue.sender.as_ref(), &queue.policy, &record).await;
        log_fate(&record, &fate);
        handled += 1;

        let delay = queue.policy.inter_record_delay;
        if !queue.is_empty() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    info!(records = handled, "delivery cycle finished, worker idle");
}

/// Attempt `record` until it is delivered, rejected, or out of attempts.
pub(crate) async fn deliver(
    sender: &dyn WebhookSender,
    policy: &RetryPolicy,
    record: &QueueRecord,
) -> RecordFate {
    let mut attempt = 1;
    loop {
        #[cfg(feature = "metrics")]
        let started = Instant::now();

        let outcome = sender.send(record).await;

        #[cfg(feature = "metrics")]
        histogram!(delivery_metrics::ATTEMPT_SECONDS).record(started.elapsed().as_secs_f64());

        match outcome {
            DeliveryOutcome::Delivered => return RecordFate::Delivered { attempts: attempt },
            DeliveryOutcome::TerminalFailure(reason) => {
                return RecordFate::Rejected {
                    attempts: attempt,
                    reason,
                };
            },
            DeliveryOutcome::RetryableFailure(reason) => {
                if !policy.should_retry(attempt) {
                    return RecordFate::Abandoned {
                        attempts: attempt,
                        reason,
                    };
                }
                let backoff = policy.backoff_after(attempt);
                warn!(
                    record_id = %record.id,
                    attempt,
                    max_attempts = policy.attempts(),
                    backoff_secs = backoff.as_secs(),
                    reason = %reason,
                    "webhook delivery failed, retrying"
                );

                #[cfg(feature = "metrics")]
                counter!(delivery_metrics::RETRIES_TOTAL).increment(1);

                tokio::time::sleep(backoff).await;
                attempt += 1;
            },
        }
    }
}

fn log_fate(record: &QueueRecord, fate: &RecordFate) {
    match fate {
        RecordFate::Delivered { attempts } => {
            info!(
                record_id = %record.id,
                message_id = %record.event.id,
                from = %record.event.from,
                attempts,
                "record delivered to webhook"
            );
            #[cfg(feature = "metrics")]
            counter!(delivery_metrics::DELIVERED_TOTAL).increment(1);
        },
        RecordFate::Rejected { attempts, reason } => {
            error!(
                record_id = %record.id,
                message_id = %record.event.id,
                attempts,
                reason = %reason,
                "webhook rejected record, dropping it"
            );
            #[cfg(feature = "metrics")]
            counter!(delivery_metrics::ABANDONED_TOTAL, labels::REASON => "rejected").increment(1);
        },
        RecordFate::Abandoned { attempts, reason } => {
            error!(
                record_id = %record.id,
                message_id = %record.event.id,
                attempts,
                reason = %reason,
                "giving up on record after exhausting retries"
            );
            #[cfg(feature = "metrics")]
            counter!(delivery_metrics::ABANDONED_TOTAL, labels::REASON => "retries_exhausted")
                .increment(1);
        },
    }
}
