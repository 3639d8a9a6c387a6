//! In-process capture target
//!
//! Clones of a [`MemoryTarget`] share one buffer, so a handle kept by the
//! caller can inspect what the registered copy received. Useful for
//! diagnostics overlays and tests.

use crate::core::{LogRecord, LoggerError, Result, Target};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Shared {
    records: Mutex<Vec<LogRecord>>,
    capacity: Option<usize>,
    fail_writes: AtomicBool,
    closed: AtomicBool,
    flushes: AtomicU64,
    write_calls: AtomicU64,
}

#[derive(Clone)]
pub struct MemoryTarget {
    name: String,
    shared: Arc<Shared>,
}

impl MemoryTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Keep only the most recent `capacity` records
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared {
                capacity: Some(capacity.max(1)),
                ..Shared::default()
            }),
        }
    }

    /// Make every subsequent write fail (for failure-isolation checks)
    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.shared.records.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.shared
            .records
            .lock()
            .iter()
            .map(|record| record.message().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shared.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.shared.records.lock().clear();
    }

    /// Number of `write`/`write_batch` calls, successful or not
    pub fn write_calls(&self) -> u64 {
        self.shared.write_calls.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> u64 {
        self.shared.flushes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<()> {
        self.shared.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(LoggerError::writer("memory target is closed"));
        }
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(LoggerError::target_write(&self.name, "simulated write failure"));
        }
        Ok(())
    }

    fn push(&self, records: impl IntoIterator<Item = LogRecord>) {
        let mut stored = self.shared.records.lock();
        stored.extend(records);
        if let Some(capacity) = self.shared.capacity {
            let excess = stored.len().saturating_sub(capacity);
            stored.drain(..excess);
        }
    }
}

impl Target for MemoryTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        self.check_writable()?;
        self.push(std::iter::once(record.clone()));
        Ok(())
    }

    fn write_batch(&mut self, records: &[&LogRecord]) -> Result<()> {
        self.check_writable()?;
        self.push(records.iter().map(|record| LogRecord::clone(record)));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.shared.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn health_check(&self) -> bool {
        !self.shared.closed.load(Ordering::SeqCst) && !self.shared.fail_writes.load(Ordering::SeqCst)
    }

    fn close(&mut self) -> Result<()> {
        self.shared.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
