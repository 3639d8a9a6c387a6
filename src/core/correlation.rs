//! Correlation scopes and record enrichment
//!
//! This module provides:
//! - `CorrelationContext`: explicitly owned context; each thread keeps its own
//!   stack of scope frames per context instance
//! - `ScopeHandle`: RAII guard that pops exactly its frame when dropped
//! - `CarriedContext`: `Send` value used to continue a correlation on another
//!   thread
//!
//! Frames copy their parent's properties when they are pushed, so the top
//! frame always holds the flattened view (child keys shadow parent keys).

use super::events::{EventBus, PipelineEvent};
use super::log_record::LogRecord;
use super::properties::Properties;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // context id -> frame stack for this thread
    static STACKS: RefCell<HashMap<u64, Vec<Frame>>> = RefCell::new(HashMap::new());
}

#[derive(Debug, Clone)]
struct Frame {
    scope_id: u64,
    correlation_id: Arc<str>,
    operation: Arc<str>,
    parent_id: Option<Arc<str>>,
    properties: Arc<Properties>,
}

/// Read-only view of the innermost scope on the calling thread
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeInfo {
    pub correlation_id: String,
    pub operation: String,
    pub parent_id: Option<String>,
    pub properties: Properties,
}

/// Diagnostic entry for a scope that has not been released yet
#[derive(Debug, Clone)]
pub struct ActiveScope {
    pub scope_id: u64,
    pub correlation_id: String,
    pub operation: String,
    pub parent_id: Option<String>,
    pub thread_id: String,
    pub started_at: DateTime<Utc>,
    started: Instant,
}

impl ActiveScope {
    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }
}

struct ContextShared {
    id: u64,
    next_scope: AtomicU64,
    active: Mutex<HashMap<String, Vec<ActiveScope>>>,
    events: Option<Arc<EventBus>>,
    max_age: Duration,
}

/// Correlation context shared by everything that logs through one pipeline.
///
/// Cloning is cheap and clones refer to the same context.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::{CorrelationContext, LogLevel, LogRecord, LogTag, Properties};
///
/// let ctx = CorrelationContext::new();
/// let scope = ctx.start_scope("load-level", None, Some(Properties::new().with("level", "forest")));
///
/// let record = ctx.enrich(LogRecord::new(LogLevel::Info, LogTag::System, "loaded"));
/// assert_eq!(record.correlation_id(), Some(scope.correlation_id()));
/// assert!(record.properties().contains_key("level"));
/// ```
#[derive(Clone)]
pub struct CorrelationContext {
    shared: Arc<ContextShared>,
}

impl CorrelationContext {
    pub fn new() -> Self {
        Self::with_settings(super::config::DEFAULT_SCOPE_MAX_AGE, None)
    }

    /// Create a context that reports scope start/completion on `events` and
    /// treats scopes older than `max_age` as stale.
    pub fn with_settings(max_age: Duration, events: Option<Arc<EventBus>>) -> Self {
        Self {
            shared: Arc::new(ContextShared {
                id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
                next_scope: AtomicU64::new(1),
                active: Mutex::new(HashMap::new()),
                events,
                max_age,
            }),
        }
    }

    /// Open a new scope with a freshly generated correlation id.
    ///
    /// The parent defaults to the innermost scope on this thread when
    /// `parent_id` is not given. Properties are inherited from the enclosing
    /// frame and overlaid with `properties`.
    pub fn start_scope(
        &self,
        operation: impl Into<String>,
        parent_id: Option<&str>,
        properties: Option<Properties>,
    ) -> ScopeHandle {
        let correlation_id: Arc<str> = Arc::from(Uuid::new_v4().to_string());
        let parent = match parent_id {
            Some(id) if !id.is_empty() => Some(Arc::from(id)),
            _ => self.top_frame().map(|frame| frame.correlation_id),
        };
        self.push(correlation_id, operation.into(), parent, properties)
    }

    /// Attach to a correlation id produced elsewhere (another thread, an
    /// inbound request). No parent relationship is recorded. An empty id
    /// falls back to a generated one.
    pub fn continue_scope(
        &self,
        existing_id: &str,
        operation: impl Into<String>,
        properties: Option<Properties>,
    ) -> ScopeHandle {
        let correlation_id: Arc<str> = if existing_id.is_empty() {
            Arc::from(Uuid::new_v4().to_string())
        } else {
            Arc::from(existing_id)
        };
        self.push(correlation_id, operation.into(), None, properties)
    }

    /// Run `f` inside a new scope; the scope is released even if `f` panics
    pub fn in_scope<R>(&self, operation: impl Into<String>, f: impl FnOnce() -> R) -> R {
        let _scope = self.start_scope(operation, None, None);
        f()
    }

    /// Merge the innermost scope into `record`.
    ///
    /// The scope's correlation id is applied only when the record has none.
    /// Inherited properties fill in keys the record does not set itself.
    pub fn enrich(&self, record: LogRecord) -> LogRecord {
        let Some(frame) = self.top_frame() else {
            return record;
        };

        let mut record = record;
        if record.correlation_id().is_none() {
            record = record.with_correlation_id(&*frame.correlation_id);
        }
        if !frame.properties.is_empty() {
            let mut merged = record.properties().clone();
            merged.extend_missing(&frame.properties);
            record = record.replace_properties(merged);
        }
        record
    }

    pub fn current(&self) -> Option<ScopeInfo> {
        self.top_frame().map(|frame| ScopeInfo {
            correlation_id: frame.correlation_id.to_string(),
            operation: frame.operation.to_string(),
            parent_id: frame.parent_id.as_deref().map(str::to_string),
            properties: Properties::clone(&frame.properties),
        })
    }

    pub fn current_correlation_id(&self) -> Option<String> {
        self.top_frame().map(|frame| frame.correlation_id.to_string())
    }

    /// Number of open scopes on the calling thread
    pub fn depth(&self) -> usize {
        let id = self.shared.id;
        STACKS.with(|stacks| stacks.borrow().get(&id).map_or(0, Vec::len))
    }

    /// Capture the innermost scope so it can be resumed on another thread
    pub fn carry(&self) -> Option<CarriedContext> {
        self.top_frame().map(|frame| CarriedContext {
            correlation_id: frame.correlation_id.to_string(),
            properties: Properties::clone(&frame.properties),
        })
    }

    /// Unreleased scopes across all threads
    pub fn active_scopes(&self) -> Vec<ActiveScope> {
        self.shared
            .active
            .lock()
            .values()
            .flat_map(|scopes| scopes.iter().cloned())
            .collect()
    }

    pub fn find_scope(&self, correlation_id: &str) -> Vec<ActiveScope> {
        self.shared
            .active
            .lock()
            .get(correlation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop diagnostic entries older than the configured max age. This only
    /// affects lookups; the frames themselves are still popped by their
    /// handles. Returns the number of entries removed.
    pub fn reap_stale_scopes(&self) -> usize {
        self.reap_older_than(self.shared.max_age)
    }

    pub fn reap_older_than(&self, max_age: Duration) -> usize {
        let mut active = self.shared.active.lock();
        let mut removed = 0;
        active.retain(|_, scopes| {
            let before = scopes.len();
            scopes.retain(|scope| scope.age() <= max_age);
            removed += before - scopes.len();
            !scopes.is_empty()
        });
        removed
    }

    fn top_frame(&self) -> Option<Frame> {
        let id = self.shared.id;
        STACKS.with(|stacks| stacks.borrow().get(&id).and_then(|stack| stack.last().cloned()))
    }

    fn push(
        &self,
        correlation_id: Arc<str>,
        operation: String,
        parent_id: Option<Arc<str>>,
        properties: Option<Properties>,
    ) -> ScopeHandle {
        let scope_id = self.shared.next_scope.fetch_add(1, Ordering::Relaxed);
        let operation: Arc<str> = Arc::from(operation);

        let mut inherited = self
            .top_frame()
            .map(|frame| Properties::clone(&frame.properties))
            .unwrap_or_default();
        if let Some(own) = properties {
            inherited.extend_overriding(&own);
        }

        let frame = Frame {
            scope_id,
            correlation_id: Arc::clone(&correlation_id),
            operation: Arc::clone(&operation),
            parent_id: parent_id.clone(),
            properties: Arc::new(inherited),
        };
        let id = self.shared.id;
        STACKS.with(|stacks| stacks.borrow_mut().entry(id).or_default().push(frame));

        self.shared
            .active
            .lock()
            .entry(correlation_id.to_string())
            .or_default()
            .push(ActiveScope {
                scope_id,
                correlation_id: correlation_id.to_string(),
                operation: operation.to_string(),
                parent_id: parent_id.as_deref().map(str::to_string),
                thread_id: format!("{:?}", std::thread::current().id()),
                started_at: Utc::now(),
                started: Instant::now(),
            });

        if let Some(events) = &self.shared.events {
            events.emit_with(|| PipelineEvent::ScopeStarted {
                correlation_id: correlation_id.to_string(),
                operation: operation.to_string(),
            });
        }

        ScopeHandle {
            context: self.clone(),
            scope_id,
            correlation_id,
            operation,
            started: Instant::now(),
            _thread_bound: PhantomData,
        }
    }

    fn release(&self, handle: &ScopeHandle) {
        let id = self.shared.id;
        // try_with: handles may be dropped while thread-locals are torn down
        let _ = STACKS.try_with(|stacks| {
            let mut stacks = stacks.borrow_mut();
            if let Some(stack) = stacks.get_mut(&id) {
                if let Some(pos) = stack.iter().rposition(|f| f.scope_id == handle.scope_id) {
                    stack.remove(pos);
                }
                if stack.is_empty() {
                    stacks.remove(&id);
                }
            }
        });

        {
            let mut active = self.shared.active.lock();
            let key: &str = &handle.correlation_id;
            if let Some(scopes) = active.get_mut(key) {
                scopes.retain(|scope| scope.scope_id != handle.scope_id);
                if scopes.is_empty() {
                    active.remove(key);
                }
            }
        }

        if let Some(events) = &self.shared.events {
            events.emit_with(|| PipelineEvent::ScopeCompleted {
                correlation_id: handle.correlation_id.to_string(),
                operation: handle.operation.to_string(),
                duration: handle.started.elapsed(),
            });
        }
    }
}

impl Default for CorrelationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for a correlation scope
///
/// Dropping the handle pops its frame from the owning thread's stack, even
/// during unwinding. The handle is deliberately `!Send`: a scope belongs to
/// the thread that opened it.
pub struct ScopeHandle {
    context: CorrelationContext,
    scope_id: u64,
    correlation_id: Arc<str>,
    operation: Arc<str>,
    started: Instant,
    _thread_bound: PhantomData<*const ()>,
}

impl ScopeHandle {
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Release the scope now instead of at end of block
    pub fn end(self) {}
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        let handle: &ScopeHandle = self;
        handle.context.release(handle);
    }
}

impl std::fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeHandle")
            .field("correlation_id", &self.correlation_id)
            .field("operation", &self.operation)
            .finish()
    }
}

/// Correlation state captured on one thread for continuation on another
#[derive(Debug, Clone, PartialEq)]
pub struct CarriedContext {
    pub correlation_id: String,
    pub properties: Properties,
}

impl CarriedContext {
    pub fn resume(&self, context: &CorrelationContext, operation: impl Into<String>) -> ScopeHandle {
        context.continue_scope(
            &self.correlation_id,
            operation,
            Some(self.properties.clone()),
        )
    }
}
