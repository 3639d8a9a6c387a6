//! Named routing groups between the queue and the targets
//!
//! A channel selects records (minimum level, tag allow/deny lists) and maps
//! them onto a subset of targets. The router state is an immutable snapshot
//! swapped on every change, so routing never takes a lock and a change only
//! affects records routed after it.

use super::error::{LoggerError, Result};
use super::log_level::LogLevel;
use super::log_record::LogRecord;
use super::log_tag::LogTag;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    name: String,
    min_level: LogLevel,
    /// Empty means every tag not explicitly denied
    allowed_tags: HashSet<LogTag>,
    denied_tags: HashSet<LogTag>,
    /// Empty means broadcast to all targets
    targets: Vec<String>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_level: LogLevel::Trace,
            allowed_tags: HashSet::new(),
            denied_tags: HashSet::new(),
            targets: Vec::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn allow_tag(mut self, tag: LogTag) -> Self {
        self.allowed_tags.insert(tag);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn deny_tag(mut self, tag: LogTag) -> Self {
        self.denied_tags.insert(tag);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn accepts_tag(&self, tag: LogTag) -> bool {
        !self.denied_tags.contains(&tag)
            && (self.allowed_tags.is_empty() || self.allowed_tags.contains(&tag))
    }

    /// Acceptance predicate used for implicit routing
    pub fn accepts(&self, record: &LogRecord) -> bool {
        record.level() >= self.min_level && self.accepts_tag(record.tag())
    }

    fn target_set(&self) -> RouteTargets {
        if self.targets.is_empty() {
            RouteTargets::Broadcast
        } else {
            RouteTargets::Only(self.targets.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTargets {
    /// Every enabled target
    Broadcast,
    Only(Vec<String>),
    /// The record is below the named channel's level
    Nothing,
}

/// Result of routing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Channel the record was routed through, used for target affinity
    pub channel: Option<String>,
    pub targets: RouteTargets,
}

impl Route {
    pub fn includes(&self, target: &str) -> bool {
        match &self.targets {
            RouteTargets::Broadcast => true,
            RouteTargets::Only(names) => names.iter().any(|name| name == target),
            RouteTargets::Nothing => false,
        }
    }
}

#[derive(Debug, Default)]
struct RouterState {
    channels: Vec<Arc<Channel>>,
    default_channel: Option<String>,
}

impl RouterState {
    fn find(&self, name: &str) -> Option<&Arc<Channel>> {
        self.channels.iter().find(|channel| channel.name == name)
    }
}

#[derive(Debug)]
pub struct ChannelRouter {
    state: ArcSwap<RouterState>,
    write_lock: Mutex<()>,
}

impl Default for ChannelRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(RouterState::default()),
            write_lock: Mutex::new(()),
        }
    }

    /// Decide which targets receive `record`.
    ///
    /// 1. A record naming a registered channel uses that channel.
    /// 2. Otherwise the first channel (registration order) accepting it.
    /// 3. Otherwise the default channel.
    /// 4. Otherwise broadcast.
    pub fn route(&self, record: &LogRecord) -> Route {
        let state = self.state.load();

        if let Some(name) = record.channel() {
            if let Some(channel) = state.find(name) {
                let targets = if record.level() >= channel.min_level {
                    channel.target_set()
                } else {
                    RouteTargets::Nothing
                };
                return Route {
                    channel: Some(channel.name.clone()),
                    targets,
                };
            }
        }

        if let Some(channel) = state.channels.iter().find(|channel| channel.accepts(record)) {
            return Route {
                channel: Some(channel.name.clone()),
                targets: channel.target_set(),
            };
        }

        if let Some(channel) = state
            .default_channel
            .as_deref()
            .and_then(|name| state.find(name))
        {
            return Route {
                channel: Some(channel.name.clone()),
                targets: channel.target_set(),
            };
        }

        Route {
            channel: record.channel().map(str::to_string),
            targets: RouteTargets::Broadcast,
        }
    }

    /// Add a channel, or replace the one with the same name in place
    pub fn register(&self, channel: Channel) -> Result<()> {
        if channel.name.trim().is_empty() {
            return Err(LoggerError::config("ChannelRouter", "channel name must not be empty"));
        }
        self.update(|state| {
            let channel = Arc::new(channel);
            match state.channels.iter_mut().find(|c| c.name == channel.name) {
                Some(existing) => *existing = channel,
                None => state.channels.push(channel),
            }
            Ok(())
        })
    }

    /// Remove a channel. Removing the default channel clears the default.
    pub fn unregister(&self, name: &str) -> bool {
        self.update(|state| {
            let before = state.channels.len();
            state.channels.retain(|channel| channel.name != name);
            let removed = state.channels.len() != before;
            if removed && state.default_channel.as_deref() == Some(name) {
                state.default_channel = None;
            }
            Ok(removed)
        })
        .unwrap_or(false)
    }

    pub fn set_default(&self, name: &str) -> Result<()> {
        self.update(|state| {
            if state.find(name).is_none() {
                return Err(LoggerError::ChannelNotFound(name.to_string()));
            }
            state.default_channel = Some(name.to_string());
            Ok(())
        })
    }

    pub fn clear_default(&self) {
        let _ = self.update(|state| {
            state.default_channel = None;
            Ok(())
        });
    }

    pub fn default_channel(&self) -> Option<String> {
        self.state.load().default_channel.clone()
    }

    pub fn set_channel_targets(&self, name: &str, targets: Vec<String>) -> Result<()> {
        self.modify(name, |channel| channel.targets = targets)
    }

    pub fn set_channel_min_level(&self, name: &str, level: LogLevel) -> Result<()> {
        self.modify(name, |channel| channel.min_level = level)
    }

    pub fn allow_tag(&self, name: &str, tag: LogTag) -> Result<()> {
        self.modify(name, |channel| {
            channel.denied_tags.remove(&tag);
            channel.allowed_tags.insert(tag);
        })
    }

    pub fn deny_tag(&self, name: &str, tag: LogTag) -> Result<()> {
        self.modify(name, |channel| {
            channel.allowed_tags.remove(&tag);
            channel.denied_tags.insert(tag);
        })
    }

    pub fn channel(&self, name: &str) -> Option<Channel> {
        self.state.load().find(name).map(|channel| Channel::clone(channel))
    }

    /// Channel names in registration order
    pub fn channel_names(&self) -> Vec<String> {
        self.state
            .load()
            .channels
            .iter()
            .map(|channel| channel.name.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.state.load().channels.is_empty()
    }

    fn modify(&self, name: &str, apply: impl FnOnce(&mut Channel)) -> Result<()> {
        self.update(|state| {
            let slot = state
                .channels
                .iter_mut()
                .find(|channel| channel.name == name)
                .ok_or_else(|| LoggerError::ChannelNotFound(name.to_string()))?;
            let mut channel = Channel::clone(slot);
            apply(&mut channel);
            *slot = Arc::new(channel);
            Ok(())
        })
    }

    /// Copy-on-write update; nothing is published if `mutate` fails
    fn update<R>(&self, mutate: impl FnOnce(&mut RouterState) -> Result<R>) -> Result<R> {
        let _guard = self.write_lock.lock();
        let current = self.state.load();
        let mut next = RouterState {
            channels: current.channels.clone(),
            default_channel: current.default_channel.clone(),
        };
        let result = mutate(&mut next)?;
        self.state.store(Arc::new(next));
        Ok(result)
    }
}
