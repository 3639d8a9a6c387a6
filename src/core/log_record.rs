//! Immutable log record

use super::log_level::LogLevel;
use super::log_tag::LogTag;
use super::properties::{FieldValue, Properties};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::RefCell;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Default upper bound for a record's message, in bytes
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 8192;

const TRUNCATION_MARKER: &str = "…";

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<Arc<str>>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<Arc<str>>>> = const { RefCell::new(None) };
}

fn thread_id() -> Arc<str> {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| Arc::from(format!("{:?}", std::thread::current().id())))
            .clone()
    })
}

fn thread_name() -> Option<Arc<str>> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(Arc::from))
            .clone()
    })
}

/// Nanoseconds elapsed since the first record of the process was created.
fn monotonic_nanos() -> u64 {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    let anchor = ANCHOR.get_or_init(Instant::now);
    u64::try_from(anchor.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Error captured alongside a record, flattened to strings so the record
/// stays `Send + Sync + Clone` regardless of the original error type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedError {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl CapturedError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            sources: Vec::new(),
        }
    }

    /// Capture an error together with its `source()` chain
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let mut sources = Vec::new();
        let mut current = error.source();
        while let Some(source) = current {
            sources.push(source.to_string());
            current = source.source();
        }

        Self {
            kind: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
            sources,
        }
    }
}

/// A single log event.
///
/// Fields are private: a record is assembled with the `with_*` builders and
/// then only read. Enrichment builds a new record instead of mutating a
/// queued one.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    level: LogLevel,
    tag: LogTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    timestamp: DateTime<Utc>,
    monotonic_nanos: u64,
    thread_id: Arc<str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_name: Option<Arc<str>>,
    #[serde(skip_serializing_if = "Properties::is_empty")]
    properties: Properties,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<CapturedError>,
}

impl LogRecord {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// to prevent attackers from injecting fake log entries.
    fn sanitize_message(message: String) -> String {
        if !message.contains(['\n', '\r', '\t']) {
            return message;
        }
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(level: LogLevel, tag: LogTag, message: impl Into<String>) -> Self {
        Self {
            level,
            tag,
            channel: None,
            category: None,
            message: Self::sanitize_message(message.into()),
            correlation_id: None,
            timestamp: Utc::now(),
            monotonic_nanos: monotonic_nanos(),
            thread_id: thread_id(),
            thread_name: thread_name(),
            properties: Properties::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the correlation id. An empty id is treated as "no id".
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        let id = correlation_id.into();
        self.correlation_id = (!id.is_empty()).then_some(id);
        self
    }

    #[must_use]
    pub fn with_property<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.properties.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties.extend_overriding(&properties);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: CapturedError) -> Self {
        self.error = Some(error);
        self
    }

    /// Bound the message to `max_len` bytes, cutting on a char boundary and
    /// appending a marker so readers can tell the text was shortened.
    #[must_use]
    pub fn truncated(mut self, max_len: usize) -> Self {
        if self.message.len() <= max_len {
            return self;
        }
        let budget = max_len.saturating_sub(TRUNCATION_MARKER.len());
        let mut cut = budget;
        while cut > 0 && !self.message.is_char_boundary(cut) {
            cut -= 1;
        }
        self.message.truncate(cut);
        if max_len >= TRUNCATION_MARKER.len() {
            self.message.push_str(TRUNCATION_MARKER);
        }
        self
    }

    pub(crate) fn replace_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn tag(&self) -> LogTag {
        self.tag
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn monotonic_nanos(&self) -> u64 {
        self.monotonic_nanos
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    /// Thread name if the thread has one, otherwise its id
    pub fn thread_label(&self) -> &str {
        self.thread_name().unwrap_or(&self.thread_id)
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn error(&self) -> Option<&CapturedError> {
        self.error.as_ref()
    }
}
