//! JSON lines target for structured logging
//!
//! Writes each record as a single-line JSON object (JSONL). Compatible with
//! log aggregation and analytics tools that ingest NDJSON.

use crate::core::{LogRecord, LoggerError, Result, Target};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct JsonTarget {
    name: String,
    writer: Option<Box<dyn Write + Send>>,
}

impl JsonTarget {
    /// Append JSON lines to the file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                LoggerError::io_operation("opening JSON log file", path.display().to_string(), e)
            })?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    /// Write JSON lines to any writer (socket, pipe, in-memory buffer)
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            name: "json".to_string(),
            writer: Some(Box::new(writer)),
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn writer(&mut self) -> Result<&mut Box<dyn Write + Send>> {
        self.writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("JSON writer is closed"))
    }
}

impl Target for JsonTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        writeln!(self.writer()?, "{}", line)?;
        Ok(())
    }

    fn write_batch(&mut self, records: &[&LogRecord]) -> Result<()> {
        let mut buffer = Vec::with_capacity(records.len() * 256);
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }
        self.writer()?.write_all(&buffer)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
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

impl Drop for JsonTarget {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CapturedError, LogLevel, LogTag};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_json_target() -> Result<()> {
        let dir = tempdir()?;
        let log_path = dir.path().join("test.jsonl");

        let mut target = JsonTarget::new(&log_path)?;
        let record = LogRecord::new(LogLevel::Info, LogTag::Gameplay, "User logged in")
            .with_property("user_id", 123)
            .with_property("action", "login")
            .with_correlation_id("req-1");

        target.write(&record)?;
        target.flush()?;

        let content = fs::read_to_string(&log_path)?;
        let parsed: serde_json::Value = serde_json::from_str(content.trim())?;
        assert_eq!(parsed["message"], "User logged in");
        assert_eq!(parsed["properties"]["user_id"], 123);
        assert_eq!(parsed["correlation_id"], "req-1");
        Ok(())
    }

    #[test]
    fn test_json_target_batch() -> Result<()> {
        let dir = tempdir()?;
        let log_path = dir.path().join("batch.jsonl");
        let mut target = JsonTarget::new(&log_path)?;

        let records: Vec<LogRecord> = (0..5)
            .map(|i| {
                LogRecord::new(LogLevel::Debug, LogTag::Default, format!("Iteration {}", i))
                    .with_property("iteration", i)
            })
            .collect();
        let refs: Vec<&LogRecord> = records.iter().collect();
        target.write_batch(&refs)?;
        target.flush()?;

        let content = fs::read_to_string(&log_path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        for line in lines {
            let parsed: serde_json::Value = serde_json::from_str(line)?;
            assert!(parsed["message"].is_string());
            assert!(parsed["level"].is_string());
        }
        Ok(())
    }

    #[test]
    fn test_error_is_serialized() -> Result<()> {
        let dir = tempdir()?;
        let log_path = dir.path().join("errors.jsonl");
        let mut target = JsonTarget::new(&log_path)?;

        let record = LogRecord::new(LogLevel::Error, LogTag::Database, "query failed")
            .with_error(CapturedError::new("Timeout", "no response after 5s"));
        target.write(&record)?;
        target.close()?;
        assert!(!target.health_check());

        let content = fs::read_to_string(&log_path)?;
        let parsed: serde_json::Value = serde_json::from_str(content.trim())?;
        assert_eq!(parsed["error"]["kind"], "Timeout");
        Ok(())
    }
}
