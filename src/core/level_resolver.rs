//! Hierarchical minimum-level resolution
//!
//! The effective minimum level for a record is the most restrictive of the
//! global level, the record tag's override and the record category's
//! override. Overrides change rarely compared to log calls, so the table is
//! published as an immutable snapshot behind an `ArcSwap`: readers never take
//! a lock and writers copy, modify and swap under a short mutex.

use super::error::{LoggerError, Result};
use super::log_level::LogLevel;
use super::log_tag::LogTag;
use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable view of the override table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelSnapshot {
    pub global: LogLevel,
    pub tag_overrides: HashMap<LogTag, LogLevel>,
    pub category_overrides: HashMap<String, LogLevel>,
}

impl LevelSnapshot {
    pub fn effective_level(&self, tag: LogTag, category: Option<&str>) -> LogLevel {
        let mut level = self.global;
        if let Some(tag_level) = self.tag_overrides.get(&tag) {
            level = level.max(*tag_level);
        }
        if let Some(category_level) = category.and_then(|c| self.category_overrides.get(c)) {
            level = level.max(*category_level);
        }
        level
    }
}

/// Named bundle of levels applied atomically
///
/// # Example
///
/// ```
/// use rust_log_pipeline::{LevelProfile, LevelResolver, LogLevel, LogTag};
///
/// let resolver = LevelResolver::new(LogLevel::Info);
/// let quiet_physics = LevelProfile::new("quiet-physics", LogLevel::Debug)
///     .with_tag(LogTag::Physics, LogLevel::Error);
///
/// resolver.apply_profile(&quiet_physics);
/// assert!(!resolver.should_log(LogLevel::Warning, LogTag::Physics, None));
/// assert!(resolver.should_log(LogLevel::Debug, LogTag::Audio, None));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LevelProfile {
    pub name: String,
    pub global: LogLevel,
    pub tag_overrides: HashMap<LogTag, LogLevel>,
    pub category_overrides: HashMap<String, LogLevel>,
}

impl LevelProfile {
    pub fn new(name: impl Into<String>, global: LogLevel) -> Self {
        Self {
            name: name.into(),
            global,
            tag_overrides: HashMap::new(),
            category_overrides: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: LogTag, level: LogLevel) -> Self {
        self.tag_overrides.insert(tag, level);
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>, level: LogLevel) -> Self {
        self.category_overrides.insert(category.into(), level);
        self
    }
}

pub struct LevelResolver {
    snapshot: ArcSwap<LevelSnapshot>,
    /// Serialises copy-on-write updates; never held across a log call
    write_lock: Mutex<()>,
    default_level: LogLevel,
    profiles: RwLock<HashMap<String, LevelProfile>>,
}

impl LevelResolver {
    pub fn new(default_level: LogLevel) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(LevelSnapshot {
                global: default_level,
                ..Default::default()
            }),
            write_lock: Mutex::new(()),
            default_level,
            profiles: RwLock::new(HashMap::new()),
        }
    }

    /// Fast-path check used before a record is even built
    #[inline]
    pub fn should_log(&self, level: LogLevel, tag: LogTag, category: Option<&str>) -> bool {
        let snapshot = self.snapshot.load();
        if level < snapshot.global {
            return false;
        }
        level >= snapshot.effective_level(tag, category)
    }

    pub fn effective_level(&self, tag: LogTag, category: Option<&str>) -> LogLevel {
        self.snapshot.load().effective_level(tag, category)
    }

    pub fn global_level(&self) -> LogLevel {
        self.snapshot.load().global
    }

    /// Current table; later updates do not affect the returned snapshot
    pub fn snapshot(&self) -> Arc<LevelSnapshot> {
        self.snapshot.load_full()
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.update(|table| table.global = level);
    }

    pub fn set_tag_override(&self, tag: LogTag, level: LogLevel) {
        self.update(|table| {
            table.tag_overrides.insert(tag, level);
        });
    }

    /// Returns `true` if an override was present
    pub fn remove_tag_override(&self, tag: LogTag) -> bool {
        self.update(|table| table.tag_overrides.remove(&tag).is_some())
    }

    pub fn set_category_override(&self, category: impl Into<String>, level: LogLevel) {
        let category = category.into();
        self.update(|table| {
            table.category_overrides.insert(category, level);
        });
    }

    /// Returns `true` if an override was present
    pub fn remove_category_override(&self, category: &str) -> bool {
        self.update(|table| table.category_overrides.remove(category).is_some())
    }

    /// Replace the global level and every override with the profile's values
    /// in one step; concurrent readers see either the old or the new table.
    pub fn apply_profile(&self, profile: &LevelProfile) {
        let table = LevelSnapshot {
            global: profile.global,
            tag_overrides: profile.tag_overrides.clone(),
            category_overrides: profile.category_overrides.clone(),
        };
        let _guard = self.write_lock.lock();
        self.snapshot.store(Arc::new(table));
    }

    /// Store a profile for later use with [`apply_named_profile`](Self::apply_named_profile).
    /// Returns the profile previously registered under the same name.
    pub fn register_profile(&self, profile: LevelProfile) -> Option<LevelProfile> {
        self.profiles.write().insert(profile.name.clone(), profile)
    }

    pub fn apply_named_profile(&self, name: &str) -> Result<()> {
        let profile = self
            .profiles
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| LoggerError::ProfileNotFound(name.to_string()))?;
        self.apply_profile(&profile);
        Ok(())
    }

    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Restore the configured global level and clear all overrides
    pub fn reset_to_defaults(&self) {
        let _guard = self.write_lock.lock();
        self.snapshot.store(Arc::new(LevelSnapshot {
            global: self.default_level,
            ..Default::default()
        }));
    }

    pub fn default_level(&self) -> LogLevel {
        self.default_level
    }

    fn update<R>(&self, mutate: impl FnOnce(&mut LevelSnapshot) -> R) -> R {
        let _guard = self.write_lock.lock();
        let mut table = LevelSnapshot::clone(&self.snapshot.load());
        let result = mutate(&mut table);
        self.snapshot.store(Arc::new(table));
        result
    }
}

impl Default for LevelResolver {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_level_only() {
        let resolver = LevelResolver::new(LogLevel::Info);
        assert!(!resolver.should_log(LogLevel::Debug, LogTag::Default, None));
        assert!(resolver.should_log(LogLevel::Info, LogTag::Default, None));
        assert!(resolver.should_log(LogLevel::Critical, LogTag::Audio, Some("mixer")));
    }

    #[test]
    fn test_tag_override_is_more_restrictive() {
        let resolver = LevelResolver::new(LogLevel::Debug);
        resolver.set_tag_override(LogTag::Physics, LogLevel::Warning);

        assert!(!resolver.should_log(LogLevel::Info, LogTag::Physics, None));
        assert!(resolver.should_log(LogLevel::Warning, LogTag::Physics, None));
        assert!(resolver.should_log(LogLevel::Info, LogTag::Rendering, None));
    }

    #[test]
    fn test_lower_override_cannot_loosen_global() {
        let resolver = LevelResolver::new(LogLevel::Warning);
        resolver.set_tag_override(LogTag::Network, LogLevel::Trace);
        assert_eq!(
            resolver.effective_level(LogTag::Network, None),
            LogLevel::Warning
        );
    }

    #[test]
    fn test_category_layer_combines_with_tag() {
        let resolver = LevelResolver::new(LogLevel::Debug);
        resolver.set_tag_override(LogTag::Network, LogLevel::Info);
        resolver.set_category_override("socket", LogLevel::Error);

        assert_eq!(resolver.effective_level(LogTag::Network, None), LogLevel::Info);
        assert_eq!(
            resolver.effective_level(LogTag::Network, Some("socket")),
            LogLevel::Error
        );
        assert_eq!(
            resolver.effective_level(LogTag::Default, Some("unknown")),
            LogLevel::Debug
        );

        assert!(resolver.remove_category_override("socket"));
        assert!(!resolver.remove_category_override("socket"));
        assert!(resolver.remove_tag_override(LogTag::Network));
        assert_eq!(resolver.effective_level(LogTag::Network, Some("socket")), LogLevel::Debug);
    }

    #[test]
    fn test_apply_profile_replaces_everything() {
        let resolver = LevelResolver::new(LogLevel::Info);
        resolver.set_category_override("ai.pathing", LogLevel::Error);

        let profile = LevelProfile::new("verbose", LogLevel::Trace)
            .with_tag(LogTag::Audio, LogLevel::Warning);
        resolver.apply_profile(&profile);

        let snapshot = resolver.snapshot();
        assert_eq!(snapshot.global, LogLevel::Trace);
        assert!(snapshot.category_overrides.is_empty());
        assert_eq!(snapshot.tag_overrides.get(&LogTag::Audio), Some(&LogLevel::Warning));
    }

    #[test]
    fn test_named_profiles() {
        let resolver = LevelResolver::new(LogLevel::Info);
        resolver.register_profile(LevelProfile::new("release", LogLevel::Warning));
        resolver.register_profile(LevelProfile::new("debug", LogLevel::Trace));

        assert_eq!(resolver.profile_names(), vec!["debug", "release"]);
        resolver.apply_named_profile("release").unwrap();
        assert_eq!(resolver.global_level(), LogLevel::Warning);

        assert!(matches!(
            resolver.apply_named_profile("missing"),
            Err(LoggerError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_reset_to_defaults() {
        let resolver = LevelResolver::new(LogLevel::Info);
        resolver.set_global_level(LogLevel::Trace);
        resolver.set_tag_override(LogTag::Ui, LogLevel::Critical);

        resolver.reset_to_defaults();

        assert_eq!(resolver.global_level(), LogLevel::Info);
        assert!(resolver.snapshot().tag_overrides.is_empty());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_updates() {
        let resolver = LevelResolver::new(LogLevel::Info);
        let before = resolver.snapshot();
        resolver.set_global_level(LogLevel::Error);
        assert_eq!(before.global, LogLevel::Info);
        assert_eq!(resolver.global_level(), LogLevel::Error);
    }
}
