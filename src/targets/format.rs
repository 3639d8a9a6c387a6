//! Text layout shared by the line-oriented targets

use crate::core::LogRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp rendering for text output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// `2025-01-08T10:30:45.123456Z`
    Iso8601Micros,

    /// `2025-01-08T10:30:45.123456+00:00`
    Rfc3339,

    /// Milliseconds since the Unix epoch
    UnixMillis,

    /// Any strftime-compatible pattern
    Custom(String),
}

impl TimestampFormat {
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampFormat::Iso8601Micros => datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            TimestampFormat::Rfc3339 => datetime.to_rfc3339(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(pattern) => datetime.format(pattern).to_string(),
        }
    }
}

/// `[ts] [LEVEL] [tag] [thread] message key=value ... cid=<id>` without a
/// trailing newline. `level` is passed in so callers can colour it.
pub(crate) fn text_line(record: &LogRecord, timestamp: &TimestampFormat, level: &str) -> String {
    let mut line = format!(
        "[{}] [{}] [{}] [{}] {}",
        timestamp.format(&record.timestamp()),
        level,
        record.tag(),
        record.thread_label(),
        record.message()
    );

    if !record.properties().is_empty() {
        line.push(' ');
        line.push_str(&record.properties().format_fields());
    }
    if let Some(id) = record.correlation_id() {
        line.push_str(" cid=");
        line.push_str(id);
    }
    if let Some(error) = record.error() {
        line.push_str(" error=\"");
        line.push_str(&error.message);
        line.push('"');
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogLevel, LogTag};
    use chrono::TimeZone;

    fn fixed_datetime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45)
            .single()
            .expect("valid datetime")
            + chrono::Duration::microseconds(123456)
    }

    #[test]
    fn test_timestamp_formats() {
        let dt = fixed_datetime();
        assert_eq!(TimestampFormat::Iso8601.format(&dt), "2025-01-08T10:30:45.123Z");
        assert_eq!(TimestampFormat::Iso8601Micros.format(&dt), "2025-01-08T10:30:45.123456Z");
        assert!(TimestampFormat::Rfc3339.format(&dt).starts_with("2025-01-08T10:30:45"));
        assert_eq!(TimestampFormat::UnixMillis.format(&dt), "1736332245123");
        assert_eq!(
            TimestampFormat::Custom("%Y/%m/%d".to_string()).format(&dt),
            "2025/01/08"
        );
    }

    #[test]
    fn test_text_line_layout() {
        let record = LogRecord::new(LogLevel::Warning, LogTag::Physics, "solver diverged")
            .with_property("step", 12)
            .with_correlation_id("abc");
        let line = text_line(&record, &TimestampFormat::Iso8601, record.level().to_str());

        assert!(line.contains("[WARN] [Physics]"));
        assert!(line.contains("solver diverged step=12"));
        assert!(line.ends_with("cid=abc"));
    }
}
