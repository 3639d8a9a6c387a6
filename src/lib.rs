//! # Rust Log Pipeline
//!
//! A structured logging runtime for latency-sensitive applications. Many
//! threads emit records without blocking; a single drain at a time batches
//! them and fans them out to independently configured targets.
//!
//! ## Features
//!
//! - **Non-blocking producers**: bounded, preallocated queue with an
//!   explicit overflow policy (drop or force-flush)
//! - **Hierarchical levels**: global, per-tag and per-category minimums with
//!   lock-free reads and named profiles
//! - **Correlation scopes**: thread-local scope stacks that enrich records
//!   with a correlation id and inherited properties
//! - **Isolated targets**: a failing or panicking sink never affects the
//!   others; health and error counts are tracked per target
//! - **Channels**: optional routing of records to curated target subsets
//!
//! ## Example
//!
//! ```
//! use rust_log_pipeline::prelude::*;
//!
//! let memory = MemoryTarget::new("memory");
//! let logger = Logger::builder()
//!     .min_level(LogLevel::Debug)
//!     .target(memory.clone())
//!     .auto_flush(false)
//!     .build()
//!     .unwrap();
//!
//! let scope = logger.start_scope("load_level");
//! logger.info("level loaded");
//! drop(scope);
//!
//! logger.flush().unwrap();
//! assert_eq!(memory.messages(), vec!["level loaded"]);
//! assert!(memory.records()[0].correlation_id().is_some());
//! ```

pub mod core;
pub mod macros;
pub mod targets;

pub mod prelude {
    #[cfg(feature = "console")]
    pub use crate::targets::ConsoleTarget;
    #[cfg(feature = "file")]
    pub use crate::targets::{FileTarget, JsonTarget};
    pub use crate::targets::MemoryTarget;
    pub use crate::core::{
        CapturedError, Channel, CorrelationContext, FieldValue, LevelProfile, LogLevel, LogRecord,
        LogTag, Logger, LoggerBuilder, LoggerError, OverflowPolicy, PipelineConfig, PipelineEvent,
        Properties, Result, ScopeHandle, Target, TargetOptions, TargetScope,
        DEFAULT_SHUTDOWN_TIMEOUT,
    };
}

#[cfg(feature = "console")]
pub use crate::targets::ConsoleTarget;
#[cfg(feature = "file")]
pub use crate::targets::{FileTarget, JsonTarget};
pub use crate::targets::MemoryTarget;
pub use crate::core::{
    CapturedError, Channel, ChannelRouter, CorrelationContext, EventBus, FieldValue, LevelProfile,
    LevelResolver, LogLevel, LogRecord, LogTag, Logger, LoggerBuilder, LoggerError, MetricsSnapshot,
    OverflowPolicy, PipelineConfig, PipelineEvent, PipelineMetrics, Properties, Result,
    ScopeHandle, Target, TargetOptions, TargetRegistry, TargetScope, DEFAULT_SHUTDOWN_TIMEOUT,
};
