//! Pipeline façade
//!
//! [`Logger`] wires the resolver, correlation context, queue, router,
//! registry and batch processor together. Producers call the logging
//! methods from any thread; draining happens on the background worker, on
//! `update`/`flush`, or on a producer thread under the force-flush overflow
//! policy.

use super::{
    batch::{BatchProcessor, DrainReport, PeriodicDrain},
    channel::{Channel, ChannelRouter},
    config::PipelineConfig,
    correlation::{CorrelationContext, ScopeHandle},
    error::{LoggerError, Result},
    events::{EventBus, EventCallback, PipelineEvent, SubscriptionId},
    level_resolver::{LevelProfile, LevelResolver},
    log_level::LogLevel,
    log_record::{CapturedError, LogRecord},
    log_tag::LogTag,
    metrics::{MetricsSnapshot, PipelineMetrics},
    overflow_policy::OverflowPolicy,
    queue::{EnqueueError, MessageQueue},
    registry::{TargetOptions, TargetRegistry, TargetScope},
    target::Target,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default shutdown timeout for logger cleanup (5 seconds)
///
/// This timeout is used when the logger is dropped without explicit shutdown.
/// For custom timeout control, use the `shutdown()` method instead.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Overflow drops are reported on stderr for the first drop and then
/// every this many drops
const DROP_ALERT_INTERVAL: u64 = 1000;

pub struct Logger {
    config: PipelineConfig,
    resolver: Arc<LevelResolver>,
    correlation: CorrelationContext,
    queue: Arc<MessageQueue>,
    registry: Arc<TargetRegistry>,
    router: Arc<ChannelRouter>,
    processor: Arc<BatchProcessor>,
    /// Metrics for observability (enqueued, dropped, processed, errors)
    metrics: Arc<PipelineMetrics>,
    events: Arc<EventBus>,
    worker: Mutex<Option<PeriodicDrain>>,
    disposed: AtomicBool,
}

impl Logger {
    /// Create a builder for Logger
    ///
    /// # Example
    /// ```
    /// use rust_log_pipeline::prelude::*;
    ///
    /// let logger = Logger::builder()
    ///     .min_level(LogLevel::Debug)
    ///     .target(MemoryTarget::new("memory"))
    ///     .auto_flush(false)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert!(logger.debug("warming up"));
    /// logger.flush().unwrap();
    /// ```
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Build a logger with no targets from a configuration snapshot
    pub fn with_config(config: PipelineConfig) -> Result<Self> {
        LoggerBuilder::new().config(config).build()
    }

    // ---- call-site API -------------------------------------------------

    /// Fast-path level check. Cheap enough to call before formatting.
    #[inline]
    pub fn should_log(&self, level: LogLevel, tag: LogTag, category: Option<&str>) -> bool {
        !self.disposed.load(Ordering::Relaxed) && self.resolver.should_log(level, tag, category)
    }

    /// Log a message under the default tag. Returns `true` if it was queued.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) -> bool {
        self.log_tagged(level, LogTag::Default, message)
    }

    pub fn log_tagged(&self, level: LogLevel, tag: LogTag, message: impl Into<String>) -> bool {
        if self.disposed.load(Ordering::Relaxed) {
            return false;
        }
        if !self.resolver.should_log(level, tag, None) {
            self.metrics.record_filtered();
            return false;
        }
        self.log_record(LogRecord::new(level, tag, message))
    }

    /// Log a fully built record (channel, category, properties, error).
    pub fn log_record(&self, record: LogRecord) -> bool {
        self.try_enqueue(record).is_ok()
    }

    /// Enrich `record` with the current correlation scope and offer it to
    /// the queue, applying the overflow policy. The record is handed back on
    /// rejection.
    pub fn try_enqueue(&self, record: LogRecord) -> std::result::Result<(), EnqueueError> {
        if self.queue.is_closed() {
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

        let record = self
            .correlation
            .enrich(record.truncated(self.config.max_message_len));

        match self.queue.try_enqueue(record) {
            Err(EnqueueError::Full(record)) => self.handle_overflow(record),
            other => other,
        }
    }

    pub fn trace(&self, message: impl Into<String>) -> bool {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: impl Into<String>) -> bool {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: impl Into<String>) -> bool {
        self.log(LogLevel::Info, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> bool {
        self.log(LogLevel::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.log(LogLevel::Error, message)
    }

    pub fn critical(&self, message: impl Into<String>) -> bool {
        self.log(LogLevel::Critical, message)
    }

    /// Log a message with a captured error and its source chain
    pub fn log_error<E>(&self, level: LogLevel, message: impl Into<String>, error: &E) -> bool
    where
        E: std::error::Error + 'static,
    {
        if !self.should_log(level, LogTag::Default, None) {
            self.metrics.record_filtered();
            return false;
        }
        self.log_record(
            LogRecord::new(level, LogTag::Default, message).with_error(CapturedError::from_error(error)),
        )
    }

    /// Open a correlation scope on the calling thread
    pub fn start_scope(&self, operation: impl Into<String>) -> ScopeHandle {
        self.correlation.start_scope(operation, None, None)
    }

    fn handle_overflow(&self, record: LogRecord) -> std::result::Result<(), EnqueueError> {
        match self.config.overflow_policy {
            OverflowPolicy::Drop => self.drop_overflow(record),
            OverflowPolicy::ForceFlush => {
                self.metrics.record_forced_flush();
                self.processor.drain();
                match self.queue.try_enqueue(record) {
                    Err(EnqueueError::Full(record)) => self.drop_overflow(record),
                    other => other,
                }
            }
        }
    }

    fn drop_overflow(&self, record: LogRecord) -> std::result::Result<(), EnqueueError> {
        let previous = self.metrics.record_dropped();
        let dropped_total = previous + 1;
        if previous % DROP_ALERT_INTERVAL == 0 {
            eprintln!(
                "[LOGGER WARNING] Log queue full (capacity {}), {} record(s) dropped so far",
                self.queue.capacity(),
                dropped_total
            );
        }
        self.events.emit_with(|| PipelineEvent::QueueCapacityReached {
            capacity: self.queue.capacity(),
            dropped_total,
        });
        Err(EnqueueError::Full(record))
    }

    // ---- host integration ----------------------------------------------

    /// Drain if the flush interval has elapsed since the previous drain.
    /// For hosts that drive the pipeline once per tick.
    pub fn update(&self) -> Result<Option<DrainReport>> {
        self.ensure_active()?;
        if self.processor.since_last_drain() >= self.config.flush_interval {
            Ok(Some(self.processor.drain()))
        } else {
            Ok(None)
        }
    }

    /// Dispatch everything queued before this call, then flush every target.
    pub fn flush(&self) -> Result<DrainReport> {
        self.ensure_active()?;
        let mut report = self.processor.drain_all();
        report.failed_targets += self.registry.flush_all();
        Ok(report)
    }

    /// Gracefully shutdown the logger with a custom timeout
    ///
    /// Stops the background worker, drains what is left in the queue, then
    /// flushes and closes every target. Subsequent administrative calls
    /// return [`LoggerError::Disposed`] and logging calls return `false`.
    ///
    /// **Note**: When the logger is dropped without calling `shutdown()`
    /// explicitly, it uses [`DEFAULT_SHUTDOWN_TIMEOUT`].
    ///
    /// # Returns
    ///
    /// `true` if shutdown completed within timeout and nothing was left
    /// behind, `false` otherwise
    pub fn shutdown(&self, timeout: Duration) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return true;
        }
        self.queue.close();

        let mut clean = match self.worker.lock().take() {
            Some(mut worker) => worker.stop(timeout),
            None => true,
        };

        // Drain whatever the worker left behind
        loop {
            let report = self.processor.drain();
            if report.skipped {
                eprintln!(
                    "[LOGGER WARNING] Final drain could not acquire the flush lock; discarding {} queued record(s)",
                    self.queue.len()
                );
                clean = false;
                break;
            }
            if report.processed == 0 {
                break;
            }
        }

        self.registry.close_all();

        let stranded = self.queue.seal();
        if stranded > 0 {
            clean = false;
        }

        let dropped = self.metrics.dropped_count();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Logger shutting down with {} dropped logs (drop rate: {:.2}%)",
                dropped,
                self.metrics.drop_rate()
            );
        }

        clean
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    // ---- administration ------------------------------------------------

    pub fn add_target<T: Target + 'static>(&self, target: T) -> Result<bool> {
        self.ensure_active()?;
        self.registry.register(target)
    }

    pub fn add_target_with<T: Target + 'static>(&self, target: T, options: TargetOptions) -> Result<bool> {
        self.ensure_active()?;
        self.registry.register_with(target, options)
    }

    /// Unregister a target; it is flushed and closed before this returns
    pub fn remove_target(&self, name: &str) -> Result<bool> {
        self.ensure_active()?;
        Ok(self.registry.unregister(name))
    }

    pub fn set_target_min_level(&self, scope: TargetScope<'_>, level: LogLevel) -> Result<usize> {
        self.ensure_active()?;
        self.registry.set_min_level(scope, level)
    }

    pub fn set_target_enabled(&self, scope: TargetScope<'_>, enabled: bool) -> Result<usize> {
        self.ensure_active()?;
        self.registry.set_enabled(scope, enabled)
    }

    pub fn add_channel(&self, channel: Channel) -> Result<()> {
        self.ensure_active()?;
        self.router.register(channel)
    }

    pub fn remove_channel(&self, name: &str) -> Result<bool> {
        self.ensure_active()?;
        Ok(self.router.unregister(name))
    }

    pub fn set_default_channel(&self, name: &str) -> Result<()> {
        self.ensure_active()?;
        self.router.set_default(name)
    }

    /// Set the global minimum level
    pub fn set_min_level(&self, level: LogLevel) -> Result<()> {
        self.ensure_active()?;
        self.resolver.set_global_level(level);
        Ok(())
    }

    pub fn min_level(&self) -> LogLevel {
        self.resolver.global_level()
    }

    pub fn set_tag_level(&self, tag: LogTag, level: LogLevel) -> Result<()> {
        self.ensure_active()?;
        self.resolver.set_tag_override(tag, level);
        Ok(())
    }

    pub fn remove_tag_level(&self, tag: LogTag) -> Result<bool> {
        self.ensure_active()?;
        Ok(self.resolver.remove_tag_override(tag))
    }

    pub fn set_category_level(&self, category: impl Into<String>, level: LogLevel) -> Result<()> {
        self.ensure_active()?;
        self.resolver.set_category_override(category, level);
        Ok(())
    }

    pub fn remove_category_level(&self, category: &str) -> Result<bool> {
        self.ensure_active()?;
        Ok(self.resolver.remove_category_override(category))
    }

    pub fn apply_profile(&self, profile: &LevelProfile) -> Result<()> {
        self.ensure_active()?;
        self.resolver.apply_profile(profile);
        Ok(())
    }

    pub fn apply_named_profile(&self, name: &str) -> Result<()> {
        self.ensure_active()?;
        self.resolver.apply_named_profile(name)
    }

    /// Restore the configured default level and clear all overrides
    pub fn reset_levels(&self) -> Result<()> {
        self.ensure_active()?;
        self.resolver.reset_to_defaults();
        Ok(())
    }

    /// Probe every target; `true` only if all are healthy
    pub fn perform_health_check(&self) -> Result<bool> {
        self.ensure_active()?;
        Ok(self.registry.perform_health_check())
    }

    pub fn health_status(&self) -> BTreeMap<String, bool> {
        self.registry.health_status()
    }

    pub fn subscribe(&self, callback: impl Fn(&PipelineEvent) + Send + Sync + 'static) -> SubscriptionId {
        self.events.subscribe(Arc::new(callback))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // ---- component access ----------------------------------------------

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn levels(&self) -> &LevelResolver {
        &self.resolver
    }

    pub fn correlation(&self) -> &CorrelationContext {
        &self.correlation
    }

    pub fn targets(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn channels(&self) -> &ChannelRouter {
        &self.router
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    pub fn processor(&self) -> &BatchProcessor {
        &self.processor
    }

    /// Get a reference to the logger metrics
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(LoggerError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use rust_log_pipeline::prelude::*;
///
/// let logger = Logger::builder()
///     .min_level(LogLevel::Debug)
///     .queue_capacity(4096)
///     .overflow_policy(OverflowPolicy::ForceFlush)
///     .target_with(MemoryTarget::new("errors"), TargetOptions::min_level(LogLevel::Error))
///     .channel(Channel::new("physics").allow_tag(LogTag::Physics))
///     .subscribe(|event| {
///         if let PipelineEvent::QueueCapacityReached { dropped_total, .. } = event {
///             eprintln!("ALERT: {} logs dropped", dropped_total);
///         }
///     })
///     .build()
///     .unwrap();
/// # drop(logger);
/// ```
pub struct LoggerBuilder {
    config: PipelineConfig,
    targets: Vec<(Box<dyn Target>, TargetOptions)>,
    channels: Vec<Channel>,
    default_channel: Option<String>,
    profiles: Vec<LevelProfile>,
    subscribers: Vec<EventCallback>,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            targets: Vec::new(),
            channels: Vec::new(),
            default_channel: None,
            profiles: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Replace the whole configuration snapshot
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the global minimum level (also the level restored on reset)
    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.config.default_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.config.max_batch_size = size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    /// Set the policy applied when the queue is full. Default is `Drop`.
    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow_policy = policy;
        self
    }

    /// Whether to spawn the background drain thread. Hosts that call
    /// `update()` every tick can turn it off.
    #[must_use = "builder methods return a new value"]
    pub fn auto_flush(mut self, enabled: bool) -> Self {
        self.config.auto_flush = enabled;
        self
    }

    /// Add a target that accepts every level on every channel
    #[must_use = "builder methods return a new value"]
    pub fn target<T: Target + 'static>(self, target: T) -> Self {
        self.target_with(target, TargetOptions::default())
    }

    #[must_use = "builder methods return a new value"]
    pub fn target_with<T: Target + 'static>(mut self, target: T, options: TargetOptions) -> Self {
        self.targets.push((Box::new(target), options));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn default_channel(mut self, name: impl Into<String>) -> Self {
        self.default_channel = Some(name.into());
        self
    }

    /// Register a named level profile for `apply_named_profile`
    #[must_use = "builder methods return a new value"]
    pub fn profile(mut self, profile: LevelProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn subscribe(mut self, callback: impl Fn(&PipelineEvent) + Send + Sync + 'static) -> Self {
        self.subscribers.push(Arc::new(callback));
        self
    }

    /// Build the Logger
    ///
    /// Fails on invalid configuration, an unnamed target or channel, or a
    /// default channel that was never added.
    pub fn build(self) -> Result<Logger> {
        let config = self.config.validate()?;

        let metrics = Arc::new(PipelineMetrics::new());
        let events = Arc::new(EventBus::new());
        for callback in self.subscribers {
            events.subscribe(callback);
        }

        let resolver = Arc::new(LevelResolver::new(config.default_level));
        for profile in self.profiles {
            resolver.register_profile(profile);
        }

        let queue = Arc::new(MessageQueue::new(
            config.queue_capacity,
            config.flush_threshold,
            Arc::clone(&resolver),
            Arc::clone(&metrics),
        ));

        let registry = Arc::new(TargetRegistry::new(
            Arc::clone(&events),
            Arc::clone(&metrics),
            config.flush_lock_timeout,
        ));
        for (target, options) in self.targets {
            registry.register_with(target, options)?;
        }

        let router = Arc::new(ChannelRouter::new());
        for channel in self.channels {
            router.register(channel)?;
        }
        if let Some(name) = &self.default_channel {
            router.set_default(name)?;
        }

        let correlation = CorrelationContext::with_settings(config.scope_max_age, Some(Arc::clone(&events)));

        let processor = Arc::new(BatchProcessor::new(
            Arc::clone(&queue),
            Arc::clone(&registry),
            Arc::clone(&router),
            Arc::clone(&metrics),
            Arc::clone(&events),
            config.max_batch_size,
            config.flush_lock_timeout,
        ));

        let worker = if config.auto_flush {
            Some(processor.run_periodic(config.flush_interval, Some(correlation.clone()))?)
        } else {
            None
        };

        Ok(Logger {
            config,
            resolver,
            correlation,
            queue,
            registry,
            router,
            processor,
            metrics,
            events,
            worker: Mutex::new(worker),
            disposed: AtomicBool::new(false),
        })
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Properties;
    use crate::targets::MemoryTarget;
    use std::io;

    fn manual_logger(memory: &MemoryTarget) -> Logger {
        Logger::builder()
            .min_level(LogLevel::Trace)
            .auto_flush(false)
            .target(memory.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = Logger::builder().queue_capacity(0).build();
        assert!(matches!(result, Err(LoggerError::InvalidConfiguration { .. })));

        let result = Logger::builder().auto_flush(false).default_channel("missing").build();
        assert!(matches!(result, Err(LoggerError::ChannelNotFound(_))));
    }

    #[test]
    fn test_log_and_flush() {
        let memory = MemoryTarget::new("memory");
        let logger = manual_logger(&memory);

        assert!(logger.info("hello"));
        assert!(logger.critical("boom"));
        let report = logger.flush().unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(memory.messages(), vec!["hello", "boom"]);
        assert_eq!(logger.metrics().processed_count(), 2);
    }

    #[test]
    fn test_filtered_records_do_not_reach_queue() {
        let memory = MemoryTarget::new("memory");
        let logger = manual_logger(&memory);
        logger.set_min_level(LogLevel::Warning).unwrap();

        assert!(!logger.info("quiet"));
        assert_eq!(logger.metrics().filtered_count(), 1);
        assert_eq!(logger.metrics().dropped_count(), 0);
        assert_eq!(logger.metrics().rejected_count(), 1);
        assert_eq!(logger.metrics().enqueued_count(), 0);
        assert!(logger.queue().is_empty());
    }

    #[test]
    fn test_drop_policy_counts_overflow() {
        let logger = Logger::builder()
            .min_level(LogLevel::Trace)
            .queue_capacity(2)
            .auto_flush(false)
            .build()
            .unwrap();

        assert!(logger.info("1"));
        assert!(logger.info("2"));
        assert!(!logger.info("3"));
        assert_eq!(logger.metrics().dropped_count(), 1);
        assert_eq!(logger.metrics().queue_full_events(), 1);
    }

    #[test]
    fn test_force_flush_policy_makes_room() {
        let memory = MemoryTarget::new("memory");
        let logger = Logger::builder()
            .min_level(LogLevel::Trace)
            .queue_capacity(2)
            .overflow_policy(OverflowPolicy::ForceFlush)
            .auto_flush(false)
            .target(memory.clone())
            .build()
            .unwrap();

        for i in 0..5 {
            assert!(logger.info(i.to_string()));
        }
        assert_eq!(logger.metrics().dropped_count(), 0);
        assert!(logger.metrics().forced_flushes() >= 1);

        logger.flush().unwrap();
        assert_eq!(memory.messages(), vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_overflow_event_is_emitted() {
        let reached = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reached);
        let logger = Logger::builder()
            .queue_capacity(1)
            .auto_flush(false)
            .subscribe(move |event| {
                if let PipelineEvent::QueueCapacityReached { dropped_total, .. } = event {
                    sink.lock().push(*dropped_total);
                }
            })
            .build()
            .unwrap();

        logger.info("fits");
        logger.info("dropped");
        logger.info("dropped too");
        assert_eq!(*reached.lock(), vec![1, 2]);
    }

    #[test]
    fn test_scope_enrichment_and_truncation() {
        let memory = MemoryTarget::new("memory");
        let logger = Logger::builder()
            .config(PipelineConfig {
                max_message_len: 8,
                ..PipelineConfig::default()
            })
            .min_level(LogLevel::Trace)
            .auto_flush(false)
            .target(memory.clone())
            .build()
            .unwrap();

        let scope = logger.correlation().start_scope(
            "load_level",
            None,
            Some(Properties::new().with("level", "forest")),
        );
        logger.info("a rather long message");
        let expected_id = scope.correlation_id().to_string();
        drop(scope);
        logger.flush().unwrap();

        let records = memory.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].correlation_id(), Some(expected_id.as_str()));
        assert_eq!(records[0].properties().get("level").and_then(|v| v.as_str()), Some("forest"));
        assert_eq!(records[0].message(), "a rat…");
    }

    #[test]
    fn test_log_error_captures_source() {
        let memory = MemoryTarget::new("memory");
        let logger = manual_logger(&memory);
        let error = io::Error::new(io::ErrorKind::NotFound, "save.dat missing");

        assert!(logger.log_error(LogLevel::Error, "load failed", &error));
        logger.flush().unwrap();

        let records = memory.records();
        let captured = records[0].error().unwrap();
        assert!(captured.message.contains("save.dat missing"));
    }

    #[test]
    fn test_update_respects_interval() {
        let memory = MemoryTarget::new("memory");
        let logger = Logger::builder()
            .min_level(LogLevel::Trace)
            .flush_interval(Duration::from_millis(20))
            .auto_flush(false)
            .target(memory.clone())
            .build()
            .unwrap();

        logger.info("tick");
        logger.flush().unwrap();
        logger.info("next");
        assert!(logger.update().unwrap().is_none());

        std::thread::sleep(Duration::from_millis(30));
        let report = logger.update().unwrap().unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn test_shutdown_drains_and_disposes() {
        let memory = MemoryTarget::new("memory");
        let logger = manual_logger(&memory);
        logger.info("last words");

        assert!(logger.shutdown(Duration::from_secs(1)));
        assert_eq!(memory.messages(), vec!["last words"]);
        assert!(memory.is_closed());

        assert!(!logger.info("too late"));
        assert!(matches!(logger.flush(), Err(LoggerError::Disposed)));
        assert!(matches!(
            logger.add_target(MemoryTarget::new("late")),
            Err(LoggerError::Disposed)
        ));
        assert!(logger.shutdown(Duration::from_secs(1)));
    }

    #[test]
    fn test_background_worker_delivers() {
        let memory = MemoryTarget::new("memory");
        let logger = Logger::builder()
            .min_level(LogLevel::Trace)
            .flush_interval(Duration::from_millis(10))
            .target(memory.clone())
            .build()
            .unwrap();

        logger.info("async");
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while memory.is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(memory.messages(), vec!["async"]);
    }

    #[test]
    fn test_named_profile() {
        let logger = Logger::builder()
            .auto_flush(false)
            .profile(LevelProfile::new("quiet", LogLevel::Error).with_tag(LogTag::Audio, LogLevel::Critical))
            .build()
            .unwrap();

        logger.apply_named_profile("quiet").unwrap();
        assert!(!logger.should_log(LogLevel::Warning, LogTag::Default, None));
        assert!(!logger.should_log(LogLevel::Error, LogTag::Audio, None));

        logger.reset_levels().unwrap();
        assert_eq!(logger.min_level(), LogLevel::Info);
        assert!(matches!(
            logger.apply_named_profile("loud"),
            Err(LoggerError::ProfileNotFound(_))
        ));
    }
}
