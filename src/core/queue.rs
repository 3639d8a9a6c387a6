//! Non-blocking multi-producer ingestion queue
//!
//! Backed by a bounded `crossbeam_channel`, whose array flavour is
//! preallocated: `try_enqueue` performs no allocation of its own and never
//! blocks. The consumer side is only touched by the batch processor while it
//! holds the flush lock, so there is one logical consumer at a time.

use super::level_resolver::LevelResolver;
use super::log_record::LogRecord;
use super::metrics::PipelineMetrics;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why a record was not accepted. The record is handed back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("queue is closed")]
    Closed(LogRecord),

    #[error("record is below the effective level")]
    Filtered(LogRecord),

    #[error("queue is at capacity")]
    Full(LogRecord),
}

impl EnqueueError {
    pub fn into_record(self) -> LogRecord {
        match self {
            EnqueueError::Closed(r) | EnqueueError::Filtered(r) | EnqueueError::Full(r) => r,
        }
    }
}

pub struct MessageQueue {
    sender: Sender<LogRecord>,
    receiver: Receiver<LogRecord>,
    capacity: usize,
    closed: AtomicBool,
    /// Set at shutdown once no drain will run again
    sealed: AtomicBool,
    resolver: Arc<LevelResolver>,
    metrics: Arc<PipelineMetrics>,
    /// Capacity trigger: wakes the periodic drain once `flush_threshold`
    /// records are waiting
    wake_sender: Sender<()>,
    wake_receiver: Receiver<()>,
    flush_threshold: usize,
}

impl MessageQueue {
    pub fn new(
        capacity: usize,
        flush_threshold: usize,
        resolver: Arc<LevelResolver>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        let (wake_sender, wake_receiver) = bounded(1);
        Self {
            sender,
            receiver,
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
            sealed: AtomicBool::new(false),
            resolver,
            metrics,
            wake_sender,
            wake_receiver,
            flush_threshold: flush_threshold.max(1),
        }
    }

    /// Offer a record to the queue without blocking.
    ///
    /// Rejections are counted in the metrics: `Closed` as dropped, `Filtered`
    /// as filtered. `Full` only bumps the queue-full counter; the caller's
    /// overflow policy decides whether the record is finally dropped.
    pub fn try_enqueue(&self, record: LogRecord) -> Result<(), EnqueueError> {
        if self.closed.load(Ordering::Acquire) {
            self.metrics.record_dropped();
            return Err(EnqueueError::Closed(record));
        }

        if !self
            .resolver
            .should_log(record.level(), record.tag(), record.category())
        {
            self.metrics.record_filtered();
            return Err(EnqueueError::Filtered(record));
        }

        match self.sender.try_send(record) {
            Ok(()) => {
                self.metrics.record_enqueued();
                // Passed the closed check but landed after shutdown sealed
                // the queue: nobody will drain it, so take one back out
                if self.sealed.load(Ordering::SeqCst) {
                    if let Ok(stranded) = self.receiver.try_recv() {
                        self.metrics.record_dropped();
                        return Err(EnqueueError::Closed(stranded));
                    }
                }
                if self.sender.len() >= self.flush_threshold {
                    // A pending token is enough; ignore Full
                    let _ = self.wake_sender.try_send(());
                }
                Ok(())
            }
            Err(TrySendError::Full(record)) => {
                self.metrics.record_queue_full();
                Err(EnqueueError::Full(record))
            }
            Err(TrySendError::Disconnected(record)) => {
                self.metrics.record_dropped();
                Err(EnqueueError::Closed(record))
            }
        }
    }

    /// Pop up to `max` records that were queued before this call.
    ///
    /// Must only be called by the single active drain.
    pub(crate) fn drain_prefix(&self, max: usize) -> Vec<LogRecord> {
        let available = self.receiver.len().min(max);
        let mut batch = Vec::with_capacity(available);
        for _ in 0..available {
            match self.receiver.try_recv() {
                Ok(record) => batch.push(record),
                Err(_) => break,
            }
        }
        batch
    }

    /// Stop accepting records. Already queued records can still be drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Close for good and discard what is still queued, counting each
    /// record as dropped. Returns the number discarded.
    pub(crate) fn seal(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        self.sealed.store(true, Ordering::SeqCst);
        let mut discarded = 0;
        while self.receiver.try_recv().is_ok() {
            self.metrics.record_dropped();
            discarded += 1;
        }
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn wake_receiver(&self) -> Receiver<()> {
        self.wake_receiver.clone()
    }
}
