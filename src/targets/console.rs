//! Console target implementation

use super::format::{text_line, TimestampFormat};
use crate::core::{LogLevel, LogRecord, Result, Target};
use colored::Colorize;
use std::io::Write;

pub struct ConsoleTarget {
    name: String,
    use_colors: bool,
    timestamp_format: TimestampFormat,
}

impl ConsoleTarget {
    pub fn new() -> Self {
        Self {
            name: "console".to_string(),
            use_colors: true,
            timestamp_format: TimestampFormat::default(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            use_colors,
            ..Self::new()
        }
    }

    /// Register under a different name, e.g. to run two console targets
    /// with different levels
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the timestamp format for this target
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_log_pipeline::targets::{ConsoleTarget, TimestampFormat};
    ///
    /// let target = ConsoleTarget::new()
    ///     .with_timestamp_format(TimestampFormat::Iso8601Micros);
    /// ```
    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    fn format_text(&self, record: &LogRecord) -> String {
        let level = format!("{:5}", record.level().to_str());
        let level = if self.use_colors {
            level.color(record.level().color_code()).to_string()
        } else {
            level
        };
        text_line(record, &self.timestamp_format, &level)
    }
}

impl Default for ConsoleTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl Target for ConsoleTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        let output = self.format_text(record);

        // Route Error and Critical levels to stderr, others to stdout
        match record.level() {
            LogLevel::Error | LogLevel::Critical => eprintln!("{}", output),
            _ => println!("{}", output),
        }
        Ok(())
    }

    fn write_batch(&mut self, records: &[&LogRecord]) -> Result<()> {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = stdout.lock();
        let mut err = stderr.lock();
        for record in records {
            let output = self.format_text(record);
            match record.level() {
                LogLevel::Error | LogLevel::Critical => writeln!(err, "{}", output)?,
                _ => writeln!(out, "{}", output)?,
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // Flush both stdout and stderr since we write to both
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogTag;

    #[test]
    fn test_plain_format_has_no_escape_codes() {
        let target = ConsoleTarget::with_colors(false);
        let record = LogRecord::new(LogLevel::Info, LogTag::Ui, "menu opened");
        let text = target.format_text(&record);

        assert!(text.contains("[INFO ] [UI]"));
        assert!(text.ends_with("menu opened"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_named_console() {
        let target = ConsoleTarget::new().named("console-errors");
        assert_eq!(target.name(), "console-errors");
        assert!(target.health_check());
    }
}
