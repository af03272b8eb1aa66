//! FIFO delivery queue with a single-cycle processing guard.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use {tokio::sync::Notify, tracing::debug};

#[cfg(feature = "metrics")]
use relay_metrics::{counter, delivery as delivery_metrics, gauge};

use crate::{
    event::{NormalizedEvent, QueueRecord, RecordId},
    retry::RetryPolicy,
    sender::WebhookSender,
    status::{QueueStatus, StatusReporter},
    worker,
};

/// Whether a delivery cycle is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Draining,
}

/// Unbounded FIFO of records awaiting delivery.
///
/// Producers call [`enqueue`](Self::enqueue) from anywhere; a single worker
/// cycle, started on demand, drains the queue through the
/// [`WebhookSender`]. The `processing` flag is the only way a cycle starts,
/// so two records are never in flight at once.
pub struct DeliveryQueue {
    records: Mutex<VecDeque<QueueRecord>>,
    processing: AtomicBool,
    next_id: AtomicU64,
    idle: Notify,
    pub(crate) sender: Arc<dyn WebhookSender>,
    pub(crate) policy: RetryPolicy,
}

impl DeliveryQueue {
    pub fn new(sender: Arc<dyn WebhookSender>, policy: RetryPolicy) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(VecDeque::new()),
            processing: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            idle: Notify::new(),
            sender,
            policy,
        })
    }

    /// Append `event` and make sure a delivery cycle is running.
    ///
    /// Never blocks on delivery. Must be called from within a Tokio runtime.
    pub fn enqueue(self: &Arc<Self>, event: NormalizedEvent) -> RecordId {
        let id = RecordId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = QueueRecord {
            id,
            enqueued_at: relay_common::time::unix_now(),
            event,
        };

        let depth = {
            let mut records = self.lock();
            records.push_back(record);
            records.len()
        };
        debug!(record_id = %id, queue_length = depth, "record enqueued");

        #[cfg(feature = "metrics")]
        {
            counter!(delivery_metrics::ENQUEUED_TOTAL).increment(1);
            gauge!(delivery_metrics::QUEUE_DEPTH).set(depth as f64);
        }

        self.start();
        id
    }

    /// Start a delivery cycle unless one is already active.
    ///
    /// Returns whether this call started it.
    pub fn start(self: &Arc<Self>) -> bool {
        if !self.try_begin_cycle() {
            return false;
        }
        let queue = Arc::clone(self);
        tokio::spawn(async move { worker::run_cycle(queue).await });
        true
    }

    /// Remove the oldest record. Only the worker cycle holding the
    /// processing flag calls this.
    pub(crate) fn dequeue(&self) -> Option<QueueRecord> {
        let mut records = self.lock();
        let record = records.pop_front();

        #[cfg(feature = "metrics")]
        gauge!(delivery_metrics::QUEUE_DEPTH).set(records.len() as f64);

        record
    }

    #[must_use]
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_length: self.len(),
            processing: self.processing.load(Ordering::SeqCst),
        }
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        if self.processing.load(Ordering::SeqCst) {
            WorkerState::Draining
        } else {
            WorkerState::Idle
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Resolve once the queue is empty and no cycle is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.state() == WorkerState::Idle && self.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Idle -> Draining. Fails if a cycle already holds the flag.
    pub(crate) fn try_begin_cycle(&self) -> bool {
        self.processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Draining -> Idle, unless a record slipped in after the last dequeue.
    ///
    /// Returns `true` if the calling cycle should keep draining.
    pub(crate) fn finish_or_resume_cycle(&self) -> bool {
        self.processing.store(false, Ordering::SeqCst);
        if self.is_empty() {
            self.idle.notify_waiters();
            return false;
        }
        // Lost the race to a fresh `start()`: that cycle drains instead.
        if !self.try_begin_cycle() {
            return false;
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueueRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StatusReporter for DeliveryQueue {
    fn report(&self) -> QueueStatus {
        self.status()
    }
}
