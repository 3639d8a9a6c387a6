//! File target implementation

use super::format::{text_line, TimestampFormat};
use crate::core::{LogRecord, LoggerError, Result, Target};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Buffered plain-text file output. Healthy while the file handle is open.
pub struct FileTarget {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    timestamp_format: TimestampFormat,
}

impl FileTarget {
    /// Open (or create) `path` in append mode
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LoggerError::io_operation("opening log file", path.display().to_string(), e)
            })?;

        Ok(Self {
            name: "file".to_string(),
            path,
            writer: Some(BufWriter::new(file)),
            timestamp_format: TimestampFormat::default(),
        })
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the timestamp format for this target
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rust_log_pipeline::targets::{FileTarget, TimestampFormat};
    ///
    /// let target = FileTarget::new("/var/log/app.log")
    ///     .unwrap()
    ///     .with_timestamp_format(TimestampFormat::Rfc3339);
    /// ```
    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("File writer is closed"))
    }
}

impl Target for FileTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        let mut output = text_line(record, &self.timestamp_format, &format!("{:5}", record.level().to_str()));
        output.push('\n');
        self.writer()?.write_all(output.as_bytes())?;
        Ok(())
    }

    fn write_batch(&mut self, records: &[&LogRecord]) -> Result<()> {
        let mut output = String::with_capacity(records.len() * 128);
        for record in records {
            output.push_str(&text_line(
                record,
                &self.timestamp_format,
                &format!("{:5}", record.level().to_str()),
            ));
            output.push('\n');
        }
        self.writer()?.write_all(output.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn health_check(&self) -> bool {
        self.writer.is_some()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for FileTarget {
    fn drop(&mut self) {
        // Ensure all buffered data is flushed to disk
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogLevel, LogTag};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_file_target_writes_lines() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("app.log");
        let mut target = FileTarget::new(&path)?;

        let first = LogRecord::new(LogLevel::Info, LogTag::System, "boot");
        let second = LogRecord::new(LogLevel::Error, LogTag::Audio, "no device");
        target.write(&first)?;
        target.write_batch(&[&second, &second])?;
        target.flush()?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("[INFO ] [System]"));
        assert!(lines[2].ends_with("no device"));
        Ok(())
    }

    #[test]
    fn test_close_makes_target_unhealthy() -> Result<()> {
        let dir = tempdir()?;
        let mut target = FileTarget::new(dir.path().join("closed.log"))?;
        assert!(target.health_check());

        target.close()?;
        assert!(!target.health_check());
        let record = LogRecord::new(LogLevel::Info, LogTag::Default, "late");
        assert!(matches!(target.write(&record), Err(LoggerError::WriterError(_))));
        Ok(())
    }

    #[test]
    fn test_open_failure_names_the_path() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("missing").join("app.log");

        match FileTarget::new(&path) {
            Err(err @ LoggerError::IoOperation { .. }) => {
                assert!(err.to_string().contains("opening log file"));
                assert!(err.to_string().contains("app.log"));
                assert!(std::error::Error::source(&err).is_some());
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("opened a file in a missing directory"),
        }
        Ok(())
    }
}
