//! Core pipeline types and traits

pub mod batch;
pub mod channel;
pub mod config;
pub mod correlation;
pub mod error;
pub mod events;
pub mod level_resolver;
pub mod log_level;
pub mod log_record;
pub mod log_tag;
pub mod logger;
pub mod metrics;
pub mod overflow_policy;
pub mod properties;
pub mod queue;
pub mod registry;
pub mod target;

pub use batch::{BatchProcessor, DrainReport, DrainState, PeriodicDrain};
pub use channel::{Channel, ChannelRouter, Route, RouteTargets};
pub use config::PipelineConfig;
pub use correlation::{ActiveScope, CarriedContext, CorrelationContext, ScopeHandle, ScopeInfo};
pub use error::{LoggerError, Result};
pub use events::{EventBus, EventCallback, PipelineEvent, SubscriptionId};
pub use level_resolver::{LevelProfile, LevelResolver, LevelSnapshot};
pub use log_level::LogLevel;
pub use log_record::{CapturedError, LogRecord};
pub use log_tag::LogTag;
pub use logger::{Logger, LoggerBuilder, DEFAULT_SHUTDOWN_TIMEOUT};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use overflow_policy::OverflowPolicy;
pub use properties::{FieldValue, Properties};
pub use queue::{EnqueueError, MessageQueue};
pub use registry::{TargetOptions, TargetRegistry, TargetScope, TargetStats};
pub use target::Target;
