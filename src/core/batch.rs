//! Batch draining and multi-target dispatch
//!
//! The processor owns the consumer side of the [`MessageQueue`]. A drain
//! runs under an exclusive flush lock acquired with a bounded wait; a caller
//! that cannot get the lock in time skips its drain instead of blocking.

use super::channel::{ChannelRouter, Route};
use super::correlation::CorrelationContext;
use super::error::{panic_message, Result};
use super::events::{EventBus, PipelineEvent};
use super::log_record::LogRecord;
use super::metrics::PipelineMetrics;
use super::queue::MessageQueue;
use super::registry::TargetRegistry;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Minimum spacing between opportunistic scope reaps in the periodic worker
const REAP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DrainState {
    Idle = 0,
    Draining = 1,
}

/// Outcome of a single drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Records popped from the queue
    pub processed: usize,
    /// Targets whose write or flush failed in this drain
    pub failed_targets: usize,
    pub elapsed: Duration,
    /// Another drain held the flush lock; nothing was done
    pub skipped: bool,
}

impl DrainReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }
}

pub struct BatchProcessor {
    queue: Arc<MessageQueue>,
    registry: Arc<TargetRegistry>,
    router: Arc<ChannelRouter>,
    metrics: Arc<PipelineMetrics>,
    events: Arc<EventBus>,
    flush_lock: Mutex<()>,
    state: AtomicU8,
    last_drain: Mutex<Instant>,
    max_batch_size: usize,
    lock_timeout: Duration,
    #[cfg(test)]
    fail_next_drain: std::sync::atomic::AtomicBool,
}

impl BatchProcessor {
    pub fn new(
        queue: Arc<MessageQueue>,
        registry: Arc<TargetRegistry>,
        router: Arc<ChannelRouter>,
        metrics: Arc<PipelineMetrics>,
        events: Arc<EventBus>,
        max_batch_size: usize,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            registry,
            router,
            metrics,
            events,
            flush_lock: Mutex::new(()),
            state: AtomicU8::new(DrainState::Idle as u8),
            last_drain: Mutex::new(Instant::now()),
            max_batch_size: max_batch_size.max(1),
            lock_timeout,
            #[cfg(test)]
            fail_next_drain: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> DrainState {
        match self.state.load(Ordering::Acquire) {
            1 => DrainState::Draining,
            _ => DrainState::Idle,
        }
    }

    /// Time since the last drain that got the flush lock
    pub fn since_last_drain(&self) -> Duration {
        self.last_drain.lock().elapsed()
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Pop up to `max_batch_size` records and dispatch them.
    ///
    /// Returns a skipped report if the flush lock could not be acquired
    /// within the lock timeout. Failures inside the drain itself are counted
    /// as internal errors; the processor stays usable for the next drain.
    pub fn drain(&self) -> DrainReport {
        let Some(_guard) = self.flush_lock.try_lock_for(self.lock_timeout) else {
            self.metrics.record_skipped_drain();
            return DrainReport::skipped();
        };

        self.state.store(DrainState::Draining as u8, Ordering::Release);
        let start = Instant::now();
        let records = self.queue.drain_prefix(self.max_batch_size);
        let processed = records.len();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.dispatch_batch(&records)));
        let elapsed = start.elapsed();
        *self.last_drain.lock() = Instant::now();
        self.state.store(DrainState::Idle as u8, Ordering::Release);

        match outcome {
            Ok(failed_targets) => {
                if processed > 0 {
                    self.metrics.record_batch(processed, elapsed);
                    self.events.emit_with(|| PipelineEvent::BatchProcessed {
                        count: processed,
                        duration: elapsed,
                    });
                }
                DrainReport {
                    processed,
                    failed_targets,
                    elapsed,
                    skipped: false,
                }
            }
            Err(panic_info) => {
                // The popped batch is lost
                for _ in 0..processed {
                    self.metrics.record_dropped();
                }
                let message = format!("drain panicked: {}", panic_message(panic_info.as_ref()));
                if self.metrics.record_internal_error() == 0 {
                    eprintln!("[LOGGER ERROR] {}", message);
                }
                self.events.emit(PipelineEvent::InternalError { message });
                DrainReport {
                    elapsed,
                    ..Default::default()
                }
            }
        }
    }

    /// Drain until the records queued at call time have been dispatched.
    ///
    /// Stops early if a drain is skipped or comes back empty.
    pub fn drain_all(&self) -> DrainReport {
        let pending = self.queue.len();
        let mut total = DrainReport::default();
        while total.processed < pending {
            let report = self.drain();
            total.elapsed += report.elapsed;
            total.failed_targets += report.failed_targets;
            if report.skipped {
                total.skipped = true;
                break;
            }
            if report.processed == 0 {
                break;
            }
            total.processed += report.processed;
        }
        total
    }

    /// Start a background thread that drains every `interval`, or earlier
    /// when the queue signals its capacity threshold. Stale correlation
    /// scopes are reaped on the same thread.
    pub fn run_periodic(
        self: &Arc<Self>,
        interval: Duration,
        correlation: Option<CorrelationContext>,
    ) -> Result<PeriodicDrain> {
        let (stop_sender, stop_receiver) = bounded::<()>(0);
        let wake_receiver = self.queue.wake_receiver();
        let processor = Arc::clone(self);

        let handle = thread::Builder::new()
            .name("log-pipeline-drain".to_string())
            .spawn(move || {
                processor.periodic_loop(interval, &stop_receiver, &wake_receiver, correlation.as_ref())
            })?;

        Ok(PeriodicDrain {
            stop: Some(stop_sender),
            handle: Some(handle),
        })
    }

    fn periodic_loop(
        &self,
        interval: Duration,
        stop: &Receiver<()>,
        wake: &Receiver<()>,
        correlation: Option<&CorrelationContext>,
    ) {
        let mut last_reap = Instant::now();
        loop {
            select! {
                recv(stop) -> _ => break,
                recv(wake) -> _ => {},
                default(interval) => {},
            }

            self.drain();

            if let Some(context) = correlation {
                if last_reap.elapsed() >= REAP_INTERVAL {
                    context.reap_stale_scopes();
                    last_reap = Instant::now();
                }
            }
        }
    }

    /// Returns the number of targets that failed
    fn dispatch_batch(&self, records: &[LogRecord]) -> usize {
        if records.is_empty() {
            return 0;
        }
        #[cfg(test)]
        if self.fail_next_drain.swap(false, Ordering::SeqCst) {
            panic!("routing table corrupted");
        }

        let routes: Vec<Route> = records.iter().map(|record| self.router.route(record)).collect();
        let slots = self.registry.snapshot();
        let mut failed_targets = 0;
        let mut subset: Vec<&LogRecord> = Vec::with_capacity(records.len());

        for slot in slots.iter().filter(|slot| slot.is_enabled()) {
            subset.clear();
            subset.extend(
                records
                    .iter()
                    .zip(&routes)
                    .filter(|(record, route)| {
                        route.includes(slot.name()) && slot.accepts(record, route.channel.as_deref())
                    })
                    .map(|(record, _)| record),
            );
            if subset.is_empty() {
                continue;
            }

            let ok = self.registry.dispatch(slot, &subset) && self.registry.flush_slot(slot);
            if !ok {
                failed_targets += 1;
            }
        }

        failed_targets
    }
}

/// Handle to the background drain thread. Dropping it stops the thread.
pub struct PeriodicDrain {
    stop: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PeriodicDrain {
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the worker and wait up to `timeout` for it to exit.
    ///
    /// Returns `false` if the worker panicked or did not finish in time.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        drop(self.stop.take());

        let Some(handle) = self.handle.take() else {
            return true;
        };
        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!("[LOGGER ERROR] Drain worker thread panicked: {:?}", e);
                    return false;
                }
                return true;
            }

            if start.elapsed() >= timeout {
                eprintln!(
                    "[LOGGER WARNING] Drain worker thread did not finish within {:?} timeout",
                    timeout
                );
                return false;
            }

            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Drop for PeriodicDrain {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop(super::logger::DEFAULT_SHUTDOWN_TIMEOUT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::Channel;
    use crate::core::level_resolver::LevelResolver;
    use crate::core::registry::TargetOptions;
    use crate::core::{LogLevel, LogTag};
    use crate::targets::MemoryTarget;

    struct Fixture {
        queue: Arc<MessageQueue>,
        registry: Arc<TargetRegistry>,
        router: Arc<ChannelRouter>,
        metrics: Arc<PipelineMetrics>,
        events: Arc<EventBus>,
        processor: Arc<BatchProcessor>,
    }

    fn fixture(max_batch: usize) -> Fixture {
        let metrics = Arc::new(PipelineMetrics::new());
        let events = Arc::new(EventBus::new());
        let resolver = Arc::new(LevelResolver::new(LogLevel::Trace));
        let queue = Arc::new(MessageQueue::new(1024, 1024, resolver, Arc::clone(&metrics)));
        let registry = Arc::new(TargetRegistry::new(
            Arc::clone(&events),
            Arc::clone(&metrics),
            Duration::from_millis(50),
        ));
        let router = Arc::new(ChannelRouter::new());
        let processor = Arc::new(BatchProcessor::new(
            Arc::clone(&queue),
            Arc::clone(&registry),
            Arc::clone(&router),
            Arc::clone(&metrics),
            Arc::clone(&events),
            max_batch,
            Duration::from_millis(50),
        ));
        Fixture {
            queue,
            registry,
            router,
            metrics,
            events,
            processor,
        }
    }

    fn push(queue: &MessageQueue, level: LogLevel, message: &str) {
        queue
            .try_enqueue(LogRecord::new(level, LogTag::Default, message))
            .unwrap();
    }

    #[test]
    fn test_drain_respects_batch_size() {
        let f = fixture(3);
        let memory = MemoryTarget::new("mem");
        f.registry.register(memory.clone()).unwrap();
        for i in 0..5 {
            push(&f.queue, LogLevel::Info, &format!("m{}", i));
        }

        let first = f.processor.drain();
        assert_eq!(first.processed, 3);
        assert_eq!(memory.len(), 3);

        let second = f.processor.drain();
        assert_eq!(second.processed, 2);
        assert_eq!(memory.messages(), vec!["m0", "m1", "m2", "m3", "m4"]);
        assert_eq!(f.metrics.processed_count(), 5);
        assert_eq!(f.metrics.batch_count(), 2);
    }

    #[test]
    fn test_drain_recovers_from_internal_failure() {
        let f = fixture(8);
        let memory = MemoryTarget::new("mem");
        f.registry.register(memory.clone()).unwrap();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        f.events.subscribe(Arc::new(move |event: &PipelineEvent| {
            if let PipelineEvent::InternalError { message } = event {
                sink.lock().push(message.clone());
            }
        }));

        push(&f.queue, LogLevel::Info, "lost");
        f.processor.fail_next_drain.store(true, Ordering::SeqCst);
        let report = f.processor.drain();

        assert_eq!(report.processed, 0);
        assert!(!report.skipped);
        assert_eq!(f.processor.state(), DrainState::Idle);
        assert_eq!(f.metrics.internal_error_count(), 1);
        assert_eq!(f.metrics.dropped_count(), 1);
        let failures_seen = failures.lock().clone();
        assert_eq!(failures_seen.len(), 1);
        assert!(failures_seen[0].contains("routing table corrupted"));

        push(&f.queue, LogLevel::Info, "next");
        let report = f.processor.drain();
        assert_eq!(report.processed, 1);
        assert_eq!(memory.messages(), vec!["next"]);
        assert_eq!(f.metrics.internal_error_count(), 1);
    }

    #[test]
    fn test_empty_drain_is_not_a_batch() {
        let f = fixture(8);
        let report = f.processor.drain();
        assert_eq!(report.processed, 0);
        assert!(!report.skipped);
        assert_eq!(f.metrics.batch_count(), 0);
    }

    #[test]
    fn test_per_target_level_and_disabled_targets() {
        let f = fixture(16);
        let info = MemoryTarget::new("info");
        let all = MemoryTarget::new("all");
        let off = MemoryTarget::new("off");
        f.registry
            .register_with(info.clone(), TargetOptions::min_level(LogLevel::Info))
            .unwrap();
        f.registry.register(all.clone()).unwrap();
        f.registry
            .register_with(off.clone(), TargetOptions::default().disabled())
            .unwrap();

        push(&f.queue, LogLevel::Debug, "debug");
        push(&f.queue, LogLevel::Warning, "warn");
        f.processor.drain();

        assert_eq!(info.messages(), vec!["warn"]);
        assert_eq!(all.messages(), vec!["debug", "warn"]);
        assert!(off.is_empty());
    }

    #[test]
    fn test_channel_routing_limits_targets() {
        let f = fixture(16);
        let console = MemoryTarget::new("console");
        let audio_file = MemoryTarget::new("audio-file");
        f.registry.register(console.clone()).unwrap();
        f.registry.register(audio_file.clone()).unwrap();
        f.router
            .register(Channel::new("audio").allow_tag(LogTag::Audio).with_target("audio-file"))
            .unwrap();

        f.queue
            .try_enqueue(LogRecord::new(LogLevel::Info, LogTag::Audio, "buffer underrun"))
            .unwrap();
        push(&f.queue, LogLevel::Info, "general");
        f.processor.drain();

        assert_eq!(audio_file.messages(), vec!["buffer underrun"]);
        assert_eq!(console.messages(), vec!["general"]);
    }

    #[test]
    fn test_failing_target_does_not_block_others() {
        let f = fixture(16);
        let bad = MemoryTarget::new("bad");
        bad.fail_writes(true);
        let good = MemoryTarget::new("good");
        f.registry.register(bad.clone()).unwrap();
        f.registry.register(good.clone()).unwrap();

        push(&f.queue, LogLevel::Info, "a");
        push(&f.queue, LogLevel::Info, "b");
        let report = f.processor.drain();

        assert_eq!(report.failed_targets, 1);
        assert_eq!(good.len(), 2);
        assert_eq!(f.registry.stats("bad").unwrap().errors, 1);
        assert_eq!(f.metrics.target_error_count(), 1);
    }

    #[test]
    fn test_concurrent_drain_is_skipped() {
        let f = fixture(16);
        let _held = f.processor.flush_lock.lock();

        let report = f.processor.drain();
        assert!(report.skipped);
        assert_eq!(f.metrics.skipped_drains(), 1);
    }

    #[test]
    fn test_drain_all_covers_observed_prefix() {
        let f = fixture(2);
        let memory = MemoryTarget::new("mem");
        f.registry.register(memory.clone()).unwrap();
        for i in 0..7 {
            push(&f.queue, LogLevel::Info, &i.to_string());
        }

        let report = f.processor.drain_all();
        assert_eq!(report.processed, 7);
        assert_eq!(memory.len(), 7);
        assert!(f.queue.is_empty());
    }

    #[test]
    fn test_periodic_worker_drains_and_stops() {
        let f = fixture(64);
        let memory = MemoryTarget::new("mem");
        f.registry.register(memory.clone()).unwrap();

        let mut worker = f
            .processor
            .run_periodic(Duration::from_millis(10), None)
            .unwrap();
        push(&f.queue, LogLevel::Info, "tick");

        let deadline = Instant::now() + Duration::from_secs(2);
        while memory.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(memory.messages(), vec!["tick"]);
        assert!(worker.stop(Duration::from_secs(2)));
        assert!(!worker.is_running());
    }
}
