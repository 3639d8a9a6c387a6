//! Pipeline metrics for observability
//!
//! Provides counters for the ingestion and dispatch stages: records
//! enqueued, filtered, dropped and processed, target errors, and drain
//! timings.
//!
//! Every record a producer offers ends up in exactly one of `filtered`
//! (below the effective level), `dropped` (overflow or shutdown) or
//! `enqueued`; every enqueued record is later counted as `processed` or,
//! if shutdown discards it, also as `dropped`. Level rejections are kept
//! apart from overflow losses; [`PipelineMetrics::rejected_count`] is their
//! sum, the number of offered records that never reached the queue or were
//! lost from it.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics for pipeline observability
///
/// # Example
///
/// ```
/// use rust_log_pipeline::PipelineMetrics;
///
/// let metrics = PipelineMetrics::new();
///
/// metrics.record_enqueued();
/// metrics.record_dropped();
///
/// assert_eq!(metrics.enqueued_count(), 1);
/// assert_eq!(metrics.dropped_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Records accepted into the queue
    enqueued: AtomicU64,

    /// Records rejected by the level check before reaching the queue
    filtered: AtomicU64,

    /// Records lost to overflow or shutdown
    dropped: AtomicU64,

    /// Records popped from the queue and dispatched
    processed: AtomicU64,

    /// Failed target writes/flushes (one per target per batch)
    target_errors: AtomicU64,

    /// Failures inside the drain loop itself
    internal_errors: AtomicU64,

    /// Times an enqueue found the queue full
    queue_full_events: AtomicU64,

    /// Drains forced by the ForceFlush overflow policy
    forced_flushes: AtomicU64,

    /// Drains that dispatched at least one record
    batches: AtomicU64,

    /// Drains skipped because another drain held the flush lock
    skipped_drains: AtomicU64,

    last_batch_micros: AtomicU64,
    total_drain_micros: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    pub filtered: u64,
    pub dropped: u64,
    pub processed: u64,
    pub target_errors: u64,
    pub internal_errors: u64,
    pub queue_full_events: u64,
    pub forced_flushes: u64,
    pub batches: u64,
    pub skipped_drains: u64,
    pub last_batch_micros: u64,
    pub total_drain_micros: u64,
}

impl PipelineMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            target_errors: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            forced_flushes: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            skipped_drains: AtomicU64::new(0),
            last_batch_micros: AtomicU64::new(0),
            total_drain_micros: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn filtered_count(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn target_error_count(&self) -> u64 {
        self.target_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn internal_error_count(&self) -> u64 {
        self.internal_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn forced_flushes(&self) -> u64 {
        self.forced_flushes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn batch_count(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn skipped_drains(&self) -> u64 {
        self.skipped_drains.load(Ordering::Relaxed)
    }

    pub fn last_batch_duration(&self) -> Duration {
        Duration::from_micros(self.last_batch_micros.load(Ordering::Relaxed))
    }

    /// Record an accepted record; returns the previous count
    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_filtered(&self) -> u64 {
        self.filtered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_target_error(&self) -> u64 {
        self.target_errors.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_internal_error(&self) -> u64 {
        self.internal_errors.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_forced_flush(&self) -> u64 {
        self.forced_flushes.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_skipped_drain(&self) -> u64 {
        self.skipped_drains.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a completed drain of `count` records
    pub fn record_batch(&self, count: usize, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.processed.fetch_add(count as u64, Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.last_batch_micros.store(micros, Ordering::Relaxed);
        self.total_drain_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Records turned away at the call site or lost afterwards:
    /// `filtered + dropped`
    #[inline]
    pub fn rejected_count(&self) -> u64 {
        self.filtered_count() + self.dropped_count()
    }

    /// Get drop rate as a percentage (0.0 - 100.0) of all records offered
    /// to the queue. Returns 0.0 if nothing was offered.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let total = self.enqueued_count() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued_count(),
            filtered: self.filtered_count(),
            dropped: self.dropped_count(),
            processed: self.processed_count(),
            target_errors: self.target_error_count(),
            internal_errors: self.internal_error_count(),
            queue_full_events: self.queue_full_events(),
            forced_flushes: self.forced_flushes(),
            batches: self.batch_count(),
            skipped_drains: self.skipped_drains(),
            last_batch_micros: self.last_batch_micros.load(Ordering::Relaxed),
            total_drain_micros: self.total_drain_micros.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        for counter in [
            &self.enqueued,
            &self.filtered,
            &self.dropped,
            &self.processed,
            &self.target_errors,
            &self.internal_errors,
            &self.queue_full_events,
            &self.forced_flushes,
            &self.batches,
            &self.skipped_drains,
            &self.last_batch_micros,
            &self.total_drain_micros,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let snapshot = PipelineMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_record_returns_previous_value() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.record_dropped(), 0);
        assert_eq!(metrics.record_dropped(), 1);
        assert_eq!(metrics.dropped_count(), 2);
    }

    #[test]
    fn test_record_batch() {
        let metrics = PipelineMetrics::new();
        metrics.record_batch(10, Duration::from_micros(250));
        metrics.record_batch(5, Duration::from_micros(100));

        assert_eq!(metrics.processed_count(), 15);
        assert_eq!(metrics.batch_count(), 2);
        assert_eq!(metrics.last_batch_duration(), Duration::from_micros(100));
        assert_eq!(metrics.snapshot().total_drain_micros, 350);
    }

    #[test]
    fn test_rejected_counts_filtered_and_dropped() {
        let metrics = PipelineMetrics::new();
        metrics.record_filtered();
        metrics.record_filtered();
        metrics.record_dropped();
        metrics.record_enqueued();

        assert_eq!(metrics.filtered_count(), 2);
        assert_eq!(metrics.dropped_count(), 1);
        assert_eq!(metrics.rejected_count(), 3);
    }

    #[test]
    fn test_metrics_drop_rate() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.drop_rate(), 0.0);

        for _ in 0..90 {
            metrics.record_enqueued();
        }
        for _ in 0..10 {
            metrics.record_dropped();
        }
        let rate = metrics.drop_rate();
        assert!((9.9..=10.1).contains(&rate), "Drop rate was {}", rate);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = PipelineMetrics::new();
        metrics.record_enqueued();
        metrics.record_target_error();
        metrics.record_batch(1, Duration::from_millis(1));

        metrics.reset();

        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
