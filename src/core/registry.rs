//! Thread-safe registry of named targets
//!
//! Reads (dispatch, health queries) load an immutable slot list from an
//! `ArcSwap` without locking. Register/unregister take a single registry-wide
//! mutex, copy the list, and publish the new one. Per-target settings are
//! atomics on the slot, so reconfiguration never waits for a sink that is in
//! the middle of a write.

use super::error::{panic_message, LoggerError, Result};
use super::events::{EventBus, PipelineEvent};
use super::log_level::LogLevel;
use super::log_record::LogRecord;
use super::metrics::PipelineMetrics;
use super::target::Target;
use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Registration settings for a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOptions {
    pub min_level: LogLevel,
    pub enabled: bool,
    /// Only receive records routed through this channel. `None` listens to
    /// every channel.
    pub channel: Option<String>,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Trace,
            enabled: true,
            channel: None,
        }
    }
}

impl TargetOptions {
    pub fn min_level(level: LogLevel) -> Self {
        Self {
            min_level: level,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Which targets a configuration call applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetScope<'a> {
    All,
    Named(&'a str),
}

/// Per-target counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetStats {
    pub records_written: u64,
    pub batches_written: u64,
    pub errors: u64,
    pub last_error: Option<String>,
}

pub(crate) struct TargetSlot {
    name: String,
    sink: Mutex<Box<dyn Target>>,
    min_level: AtomicU8,
    enabled: AtomicBool,
    healthy: AtomicBool,
    closed: AtomicBool,
    channel: RwLock<Option<String>>,
    records_written: AtomicU64,
    batches_written: AtomicU64,
    errors: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl TargetSlot {
    fn new(name: String, sink: Box<dyn Target>, options: TargetOptions) -> Self {
        Self {
            name,
            sink: Mutex::new(sink),
            min_level: AtomicU8::new(options.min_level as u8),
            enabled: AtomicBool::new(options.enabled),
            healthy: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            channel: RwLock::new(options.channel),
            records_written: AtomicU64::new(0),
            batches_written: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn min_level(&self) -> LogLevel {
        LogLevel::from_u8(self.min_level.load(Ordering::Relaxed))
    }

    /// Pure predicate: level and channel affinity
    pub(crate) fn accepts(&self, record: &LogRecord, routed_channel: Option<&str>) -> bool {
        if record.level() < self.min_level() {
            return false;
        }
        match self.channel.read().as_deref() {
            None => true,
            Some(affinity) => routed_channel == Some(affinity),
        }
    }

    fn stats(&self) -> TargetStats {
        TargetStats {
            records_written: self.records_written.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }

    fn close_sink(sink: &mut dyn Target, name: &str) {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            sink.flush().and_then(|()| sink.close())
        }));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => eprintln!("[LOGGER ERROR] Target '{}' failed to close: {}", name, e),
            Err(panic_info) => eprintln!(
                "[LOGGER CRITICAL] Target '{}' panicked while closing: {}",
                name,
                panic_message(panic_info.as_ref())
            ),
        }
    }
}

impl Drop for TargetSlot {
    fn drop(&mut self) {
        // Covers unregister calls that could not close a busy sink in time
        if !self.closed.swap(true, Ordering::AcqRel) {
            Self::close_sink(self.sink.get_mut().as_mut(), &self.name);
        }
    }
}

pub struct TargetRegistry {
    slots: ArcSwap<Vec<Arc<TargetSlot>>>,
    write_lock: Mutex<()>,
    events: Arc<EventBus>,
    metrics: Arc<PipelineMetrics>,
    lock_timeout: Duration,
}

impl TargetRegistry {
    pub fn new(events: Arc<EventBus>, metrics: Arc<PipelineMetrics>, lock_timeout: Duration) -> Self {
        Self {
            slots: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
            events,
            metrics,
            lock_timeout,
        }
    }

    /// Register a target that accepts every level on every channel
    pub fn register<T: Target + 'static>(&self, target: T) -> Result<bool> {
        self.register_with(target, TargetOptions::default())
    }

    /// Register a target. Returns `Ok(false)` without replacing anything if a
    /// target with the same name already exists.
    pub fn register_with<T: Target + 'static>(&self, target: T, options: TargetOptions) -> Result<bool> {
        let name = target.name().to_string();
        if name.trim().is_empty() {
            return Err(LoggerError::config("TargetRegistry", "target name must not be empty"));
        }

        let _guard = self.write_lock.lock();
        let current = self.slots.load();
        if current.iter().any(|slot| slot.name == name) {
            eprintln!(
                "[LOGGER WARNING] Target '{}' is already registered; ignoring duplicate registration",
                name
            );
            return Ok(false);
        }

        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(Arc::new(TargetSlot::new(name, Box::new(target), options)));
        self.slots.store(Arc::new(next));
        Ok(true)
    }

    /// Remove a target, then flush and close it before returning.
    ///
    /// If a drain is writing to the target, the close waits at most the
    /// flush lock timeout; otherwise it happens when the drain lets go.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = {
            let _guard = self.write_lock.lock();
            let current = self.slots.load();
            let Some(pos) = current.iter().position(|slot| slot.name == name) else {
                return false;
            };
            let mut next: Vec<Arc<TargetSlot>> = current.iter().cloned().collect();
            let removed = next.remove(pos);
            self.slots.store(Arc::new(next));
            removed
        };

        match removed.sink.try_lock_for(self.lock_timeout) {
            Some(mut sink) => {
                if !removed.closed.swap(true, Ordering::AcqRel) {
                    TargetSlot::close_sink(sink.as_mut(), name);
                }
            }
            None => eprintln!(
                "[LOGGER WARNING] Target '{}' is busy; it will be closed after the current write",
                name
            ),
        }
        true
    }

    pub fn set_min_level(&self, scope: TargetScope<'_>, level: LogLevel) -> Result<usize> {
        self.configure(scope, |slot| slot.min_level.store(level as u8, Ordering::Relaxed))
    }

    pub fn set_enabled(&self, scope: TargetScope<'_>, enabled: bool) -> Result<usize> {
        self.configure(scope, |slot| slot.enabled.store(enabled, Ordering::Relaxed))
    }

    pub fn set_channel_affinity(&self, name: &str, channel: Option<String>) -> Result<()> {
        let slot = self
            .find(name)
            .ok_or_else(|| LoggerError::TargetNotFound(name.to_string()))?;
        *slot.channel.write() = channel;
        Ok(())
    }

    /// Probe every target and return `true` only if all of them are healthy.
    ///
    /// A target busy in a write keeps its previous status for this round.
    pub fn perform_health_check(&self) -> bool {
        let slots = self.slots.load_full();
        let mut all_healthy = true;
        for slot in slots.iter() {
            let healthy = match slot.sink.try_lock() {
                Some(sink) => {
                    let probe = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        sink.health_check()
                    }));
                    probe.unwrap_or(false)
                }
                None => slot.healthy.load(Ordering::Relaxed),
            };
            self.set_health(slot, healthy);
            all_healthy &= healthy;
        }
        all_healthy
    }

    pub fn health_status(&self) -> BTreeMap<String, bool> {
        self.slots
            .load()
            .iter()
            .map(|slot| (slot.name.clone(), slot.healthy.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn stats(&self, name: &str) -> Option<TargetStats> {
        self.find(name).map(|slot| slot.stats())
    }

    pub fn min_level_of(&self, name: &str) -> Option<LogLevel> {
        self.find(name).map(|slot| slot.min_level())
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.find(name).map(|slot| slot.is_enabled())
    }

    /// Target names in registration order
    pub fn names(&self) -> Vec<String> {
        self.slots.load().iter().map(|slot| slot.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.load().is_empty()
    }

    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<TargetSlot>>> {
        self.slots.load_full()
    }

    /// Write `records` to one target with error and panic isolation.
    /// Returns `false` if the target failed. A target closed by `unregister`
    /// or shutdown is skipped.
    pub(crate) fn dispatch(&self, slot: &TargetSlot, records: &[&LogRecord]) -> bool {
        if records.is_empty() {
            return true;
        }

        let mut sink = slot.sink.lock();
        // `closed` is only set while holding the sink lock
        if slot.closed.load(Ordering::Acquire) {
            return true;
        }
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            if let [single] = records {
                sink.write(single)
            } else {
                sink.write_batch(records)
            }
        }));
        drop(sink);

        match result {
            Ok(Ok(())) => {
                slot.records_written
                    .fetch_add(records.len() as u64, Ordering::Relaxed);
                slot.batches_written.fetch_add(1, Ordering::Relaxed);
                true
            }
            Ok(Err(e)) => {
                self.record_failure(slot, e.to_string());
                false
            }
            Err(panic_info) => {
                self.record_failure(
                    slot,
                    format!("panicked: {}", panic_message(panic_info.as_ref())),
                );
                false
            }
        }
    }

    /// Flush one target with isolation. Returns `false` on failure.
    pub(crate) fn flush_slot(&self, slot: &TargetSlot) -> bool {
        let mut sink = slot.sink.lock();
        if slot.closed.load(Ordering::Acquire) {
            return true;
        }
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink.flush()));
        drop(sink);
        match result {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                self.record_failure(slot, format!("flush failed: {}", e));
                false
            }
            Err(panic_info) => {
                self.record_failure(
                    slot,
                    format!("panicked during flush: {}", panic_message(panic_info.as_ref())),
                );
                false
            }
        }
    }

    /// Flush every target. Returns the number of targets that failed.
    pub fn flush_all(&self) -> usize {
        let slots = self.slots.load_full();
        slots.iter().filter(|slot| !self.flush_slot(slot)).count()
    }

    /// Flush, close and remove every target. Failures are reported on stderr
    /// and otherwise ignored.
    pub(crate) fn close_all(&self) {
        let removed = {
            let _guard = self.write_lock.lock();
            self.slots.swap(Arc::new(Vec::new()))
        };
        for slot in removed.iter() {
            if let Some(mut sink) = slot.sink.try_lock_for(self.lock_timeout) {
                if !slot.closed.swap(true, Ordering::AcqRel) {
                    TargetSlot::close_sink(sink.as_mut(), &slot.name);
                }
            }
        }
    }

    fn find(&self, name: &str) -> Option<Arc<TargetSlot>> {
        self.slots.load().iter().find(|slot| slot.name == name).cloned()
    }

    fn configure(&self, scope: TargetScope<'_>, apply: impl Fn(&TargetSlot)) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let slots = self.slots.load();
        match scope {
            TargetScope::All => {
                slots.iter().for_each(|slot| apply(slot));
                Ok(slots.len())
            }
            TargetScope::Named(name) => {
                let slot = slots
                    .iter()
                    .find(|slot| slot.name == name)
                    .ok_or_else(|| LoggerError::TargetNotFound(name.to_string()))?;
                apply(slot);
                Ok(1)
            }
        }
    }

    fn record_failure(&self, slot: &TargetSlot, message: String) {
        slot.errors.fetch_add(1, Ordering::Relaxed);
        *slot.last_error.lock() = Some(message.clone());
        self.metrics.record_target_error();
        if self.set_health(slot, false) {
            eprintln!("[LOGGER ERROR] Target '{}' failed: {}", slot.name, message);
        }
        self.events.emit_with(|| PipelineEvent::TargetError {
            target: slot.name.clone(),
            message,
        });
    }

    /// Returns `true` if the health flag changed
    fn set_health(&self, slot: &TargetSlot, healthy: bool) -> bool {
        let previous = slot.healthy.swap(healthy, Ordering::AcqRel);
        if previous != healthy {
            self.events.emit_with(|| PipelineEvent::TargetHealthChanged {
                target: slot.name.clone(),
                healthy,
            });
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogTag;
    use crate::targets::MemoryTarget;

    struct FailingTarget {
        closed: Arc<AtomicBool>,
        healthy: bool,
    }

    impl Target for FailingTarget {
        fn name(&self) -> &str {
            "failing"
        }

        fn write(&mut self, _record: &LogRecord) -> Result<()> {
            Err(LoggerError::writer("device unplugged"))
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn health_check(&self) -> bool {
            self.healthy
        }

        fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn registry() -> TargetRegistry {
        TargetRegistry::new(
            Arc::new(EventBus::new()),
            Arc::new(PipelineMetrics::new()),
            Duration::from_millis(100),
        )
    }

    fn record(level: LogLevel) -> LogRecord {
        LogRecord::new(level, LogTag::Default, "m")
    }

    #[test]
    fn test_duplicate_registration_is_noop() {
        let registry = registry();
        assert!(registry.register(MemoryTarget::new("mem")).unwrap());
        assert!(!registry.register(MemoryTarget::new("mem")).unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = registry();
        assert!(registry.register(MemoryTarget::new("  ")).is_err());
    }

    #[test]
    fn test_unregister_closes_target() {
        let registry = registry();
        let closed = Arc::new(AtomicBool::new(false));
        registry
            .register(FailingTarget { closed: Arc::clone(&closed), healthy: true })
            .unwrap();

        assert!(registry.unregister("failing"));
        assert!(closed.load(Ordering::SeqCst));
        assert!(!registry.unregister("failing"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregistered_slot_is_not_written() {
        let metrics = Arc::new(PipelineMetrics::new());
        let registry = TargetRegistry::new(
            Arc::new(EventBus::new()),
            Arc::clone(&metrics),
            Duration::from_millis(100),
        );
        let memory = MemoryTarget::new("mem");
        registry.register(memory.clone()).unwrap();

        // A drain that loaded the slot list before the removal
        let slots = registry.snapshot();
        assert!(registry.unregister("mem"));
        assert!(memory.is_closed());
        let flushes_at_close = memory.flush_count();

        let late = record(LogLevel::Error);
        assert!(registry.dispatch(&slots[0], &[&late]));
        assert!(registry.flush_slot(&slots[0]));

        assert_eq!(memory.write_calls(), 0);
        assert_eq!(memory.flush_count(), flushes_at_close);
        assert_eq!(metrics.target_error_count(), 0);
        assert_eq!(slots[0].stats().errors, 0);
    }

    #[test]
    fn test_configuration_scopes() {
        let registry = registry();
        registry.register(MemoryTarget::new("a")).unwrap();
        registry.register(MemoryTarget::new("b")).unwrap();

        assert_eq!(registry.set_min_level(TargetScope::All, LogLevel::Warning).unwrap(), 2);
        assert_eq!(registry.set_enabled(TargetScope::Named("b"), false).unwrap(), 1);
        assert!(matches!(
            registry.set_enabled(TargetScope::Named("zzz"), false),
            Err(LoggerError::TargetNotFound(_))
        ));

        assert_eq!(registry.min_level_of("a"), Some(LogLevel::Warning));
        assert_eq!(registry.is_enabled("a"), Some(true));
        assert_eq!(registry.is_enabled("b"), Some(false));
    }

    #[test]
    fn test_accepts_level_and_channel_affinity() {
        let registry = registry();
        registry
            .register_with(
                MemoryTarget::new("audio-only"),
                TargetOptions::min_level(LogLevel::Info).with_channel("audio"),
            )
            .unwrap();
        let slots = registry.snapshot();
        let slot = &slots[0];

        assert!(!slot.accepts(&record(LogLevel::Debug), Some("audio")));
        assert!(slot.accepts(&record(LogLevel::Info), Some("audio")));
        assert!(!slot.accepts(&record(LogLevel::Error), Some("net")));
        assert!(!slot.accepts(&record(LogLevel::Error), None));

        registry.set_channel_affinity("audio-only", None).unwrap();
        assert!(slot.accepts(&record(LogLevel::Error), None));
    }

    #[test]
    fn test_dispatch_failure_is_recorded() {
        let registry = registry();
        registry
            .register(FailingTarget {
                closed: Arc::new(AtomicBool::new(false)),
                healthy: true,
            })
            .unwrap();
        let slots = registry.snapshot();
        let r = record(LogLevel::Info);

        assert!(!registry.dispatch(&slots[0], &[&r, &r]));

        let stats = registry.stats("failing").unwrap();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.records_written, 0);
        assert!(stats.last_error.unwrap().contains("device unplugged"));
        assert_eq!(registry.health_status().get("failing"), Some(&false));
    }

    #[test]
    fn test_health_check_aggregates() {
        let registry = registry();
        assert!(registry.perform_health_check());

        registry.register(MemoryTarget::new("ok")).unwrap();
        registry
            .register(FailingTarget {
                closed: Arc::new(AtomicBool::new(false)),
                healthy: false,
            })
            .unwrap();

        assert!(!registry.perform_health_check());
        let status = registry.health_status();
        assert_eq!(status.get("ok"), Some(&true));
        assert_eq!(status.get("failing"), Some(&false));

        registry.unregister("failing");
        assert!(registry.perform_health_check());
    }

    #[test]
    fn test_health_recovers_after_failure() {
        let registry = registry();
        registry.register(MemoryTarget::new("mem")).unwrap();
        let slots = registry.snapshot();
        registry.record_failure(&slots[0], "transient".into());
        assert_eq!(registry.health_status().get("mem"), Some(&false));

        assert!(registry.perform_health_check());
        assert_eq!(registry.health_status().get("mem"), Some(&true));
    }
}
