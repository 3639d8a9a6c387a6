//! Sink contract for log output destinations

use super::{error::Result, log_record::LogRecord};

/// An output destination (console, file, network, analytics, ...).
///
/// Once a target is registered, the [`TargetRegistry`](super::TargetRegistry)
/// owns it: level, enabled flag and channel affinity are managed by the
/// registry, and the sink only sees records it has to write.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::core::{LogRecord, Result, Target};
///
/// struct CountingTarget(usize);
///
/// impl Target for CountingTarget {
///     fn name(&self) -> &str {
///         "counting"
///     }
///
///     fn write(&mut self, _record: &LogRecord) -> Result<()> {
///         self.0 += 1;
///         Ok(())
///     }
///
///     fn flush(&mut self) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait Target: Send {
    /// Unique registry key
    fn name(&self) -> &str;

    fn write(&mut self, record: &LogRecord) -> Result<()>;

    /// Write several records at once. Sinks with a cheaper bulk path
    /// (one syscall, one network frame) should override this.
    fn write_batch(&mut self, records: &[&LogRecord]) -> Result<()> {
        for record in records {
            self.write(record)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()>;

    /// Cheap, side-effect-free probe (e.g. "is the handle open").
    /// Must not perform a write.
    fn health_check(&self) -> bool {
        true
    }

    /// Release the underlying resource. Called once, after a final flush,
    /// when the target is unregistered or the pipeline shuts down.
    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

impl<T: Target + ?Sized> Target for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        (**self).write(record)
    }

    fn write_batch(&mut self, records: &[&LogRecord]) -> Result<()> {
        (**self).write_batch(records)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn health_check(&self) -> bool {
        (**self).health_check()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
