//! Pipeline notifications
//!
//! The pipeline owns an [`EventBus`]; alerting or health subsystems subscribe
//! to it. With no subscribers, emitting is a cheap no-op.

use super::error::panic_message;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PipelineEvent {
    BatchProcessed {
        count: usize,
        duration: Duration,
    },
    QueueCapacityReached {
        capacity: usize,
        dropped_total: u64,
    },
    TargetError {
        target: String,
        message: String,
    },
    TargetHealthChanged {
        target: String,
        healthy: bool,
    },
    ScopeStarted {
        correlation_id: String,
        operation: String,
    },
    ScopeCompleted {
        correlation_id: String,
        operation: String,
        duration: Duration,
    },
    InternalError {
        message: String,
    },
}

/// Callback type for pipeline notifications
pub type EventCallback = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<(SubscriptionId, EventCallback)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: EventCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, callback));
        id
    }

    /// Returns `false` if the subscription was already removed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.read().is_empty()
    }

    /// Deliver an event to every subscriber. A panicking subscriber is
    /// reported on stderr and does not prevent delivery to the others.
    pub fn emit(&self, event: PipelineEvent) {
        // Snapshot so callbacks may (un)subscribe without deadlocking
        let subscribers: Vec<EventCallback> = {
            let guard = self.subscribers.read();
            if guard.is_empty() {
                return;
            }
            guard.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };

        for callback in subscribers {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(&event)));
            if let Err(panic_info) = result {
                eprintln!(
                    "[LOGGER ERROR] Event subscriber panicked: {}",
                    panic_message(panic_info.as_ref())
                );
            }
        }
    }

    /// Like [`emit`](Self::emit) but only builds the event when someone listens
    pub fn emit_with(&self, build: impl FnOnce() -> PipelineEvent) {
        if self.has_subscribers() {
            self.emit(build());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.emit(PipelineEvent::InternalError {
            message: "nobody listens".into(),
        });
        assert!(!bus.has_subscribers());
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = bus.subscribe(Arc::new(move |event| sink.lock().push(event.clone())));

        bus.emit(PipelineEvent::BatchProcessed {
            count: 3,
            duration: Duration::from_millis(1),
        });
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(PipelineEvent::InternalError { message: "x".into() });

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], PipelineEvent::BatchProcessed { count: 3, .. }));
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicU64::new(0));
        bus.subscribe(Arc::new(|_| panic!("subscriber bug")));
        let counter = Arc::clone(&calls);
        bus.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        bus.emit(PipelineEvent::InternalError { message: "boom".into() });
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_emit_with_skips_builder_when_idle() {
        let bus = EventBus::new();
        let mut built = false;
        bus.emit_with(|| {
            built = true;
            PipelineEvent::InternalError { message: String::new() }
        });
        assert!(!built);
    }
}
