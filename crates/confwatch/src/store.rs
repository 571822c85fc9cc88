//! The live configuration store.
//!
//! [`ConfigStore`] owns the current snapshot and every registered watch.
//! Replacing the snapshot swaps one `Arc` under a write lock, bumps the
//! epoch and then lets each watch diff itself against the new snapshot.
//!
//! ```rust
//! use confwatch::{ConfigStore, ConfigTree};
//! use serde_json::json;
//!
//! let store = ConfigStore::new();
//! store.on_key_change("server.port", || println!("port changed")).unwrap();
//!
//! let previous = store.replace_snapshot(
//!     ConfigTree::try_from(json!({"server": {"port": 8080}})).unwrap(),
//! );
//! assert!(previous.flattened_paths().is_empty());
//! assert_eq!(store.epoch(), 1);
//! ```
//!
//! # Consistency
//!
//! A watch registered concurrently with a replacement is either part of
//! that replacement's notify pass or was initialised against the newer
//! snapshot, so no transition is lost.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use regex::Regex;

use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::event::ConfigUpdateEvent;
use crate::tree::ConfigTree;
use crate::value::Value;
use crate::watch::{
    DEFAULT_POOL_CAPACITY, EventCallback, ItemPool, KeyCallback, KeyWatch, MapKeyWatch,
    MatchKeyWatch, Watch, WatchContext,
};

/// Registered watches, keyed by path or pattern source text.
#[derive(Default)]
struct Registry {
    keys: HashMap<String, Arc<KeyWatch>>,
    maps: HashMap<String, Arc<MapKeyWatch>>,
    matches: HashMap<String, Arc<MatchKeyWatch>>,
}

impl Registry {
    fn all(&self) -> Vec<Arc<dyn Watch>> {
        let keys = self.keys.values().map(|w| Arc::clone(w) as Arc<dyn Watch>);
        let maps = self.maps.values().map(|w| Arc::clone(w) as Arc<dyn Watch>);
        let matches = self
            .matches
            .values()
            .map(|w| Arc::clone(w) as Arc<dyn Watch>);
        keys.chain(maps).chain(matches).collect()
    }

    fn len(&self) -> usize {
        self.keys.len() + self.maps.len() + self.matches.len()
    }
}

/// A live configuration snapshot with change watches.
///
/// # Thread Safety
///
/// - Any number of threads may read the snapshot concurrently
/// - Replacements are atomic; readers see the old or the new tree
/// - Two watches diff independently; one watch diffs one transition at a time
/// - Callbacks run detached and never block the store
pub struct ConfigStore {
    /// Current snapshot.
    snapshot: RwLock<ConfigTree>,

    /// Incremented on each replacement.
    epoch: AtomicU64,

    registry: RwLock<Registry>,

    pool: ItemPool,

    dispatcher: Dispatcher,
}

impl ConfigStore {
    /// Creates a store with an empty snapshot and default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts a [`ConfigStoreBuilder`].
    #[must_use]
    pub fn builder() -> ConfigStoreBuilder {
        ConfigStoreBuilder::default()
    }

    /// The current snapshot.
    #[must_use]
    pub fn current(&self) -> ConfigTree {
        self.snapshot.read().clone()
    }

    /// Clones the value at `path` out of the current snapshot.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        self.snapshot.read().get(path).cloned()
    }

    /// Number of replacements so far.
    ///
    /// Compare two readings to detect a replacement without comparing
    /// snapshots.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Returns `true` if the snapshot was replaced after `epoch` was read.
    #[must_use]
    pub fn has_changed_since(&self, epoch: u64) -> bool {
        self.epoch() != epoch
    }

    /// The dispatcher callbacks run on.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Installs `tree` as the current snapshot and notifies every watch.
    ///
    /// Returns the previous snapshot. Watches are checked one after the
    /// other on the calling thread; their callbacks are dispatched and not
    /// awaited. A watch whose diff fails is logged and skipped, keeping its
    /// previous baseline.
    pub fn replace_snapshot(&self, tree: ConfigTree) -> ConfigTree {
        let previous = {
            let mut guard = self.snapshot.write();
            std::mem::replace(&mut *guard, tree)
        };

        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(epoch, "configuration snapshot replaced");

        self.notify_all();
        previous
    }

    /// Replaces the snapshot only if `tree` differs in content.
    ///
    /// Returns whether a replacement happened.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Canonicalize`] if either tree cannot be digested.
    pub fn replace_if_changed(&self, tree: ConfigTree) -> Result<bool, Error> {
        if self.current().same_content(&tree)? {
            tracing::trace!("snapshot content unchanged, skipping replacement");
            return Ok(false);
        }
        self.replace_snapshot(tree);
        Ok(true)
    }

    fn notify_all(&self) {
        let watches = self.registry.read().all();
        let ctx = self.context();

        for watch in watches {
            match watch.check_and_notify(&ctx) {
                Ok(0) => {}

                Ok(dispatched) => {
                    tracing::trace!(target_key = watch.target(), dispatched, "watch fired");
                }

                Err(e) => {
                    tracing::error!(
                        target_key = watch.target(),
                        error = %e,
                        "watch diff aborted, baseline kept"
                    );
                }
            }
        }
    }

    fn context(&self) -> WatchContext<'_> {
        WatchContext {
            snapshot: &self.snapshot,
            pool: &self.pool,
            dispatcher: &self.dispatcher,
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Calls `callback` whenever the value at `path` changes.
    ///
    /// Registering the same path again adds another callback to the
    /// existing watch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Canonicalize`] if the current value at `path` cannot
    /// be digested; no watch is created.
    pub fn on_key_change<F>(&self, path: &str, callback: F) -> Result<(), Error>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: KeyCallback = Arc::new(callback);
        let mut registry = self.registry.write();

        if let Some(watch) = registry.keys.get(path) {
            watch.add_callback(callback);
            return Ok(());
        }

        let watch = KeyWatch::new(path, &self.current(), callback)?;
        registry.keys.insert(path.to_string(), Arc::new(watch));
        tracing::debug!(path, "key watch registered");
        Ok(())
    }

    /// Calls `callback` once per added, updated or deleted child of `path`.
    ///
    /// The value at `path` is expected to be a map or list. Registering the
    /// same path again adds another callback to the existing watch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Canonicalize`] if the current children cannot be
    /// digested; no watch is created.
    pub fn on_map_key_change<F>(&self, path: &str, callback: F) -> Result<(), Error>
    where
        F: Fn(ConfigUpdateEvent) + Send + Sync + 'static,
    {
        let callback: EventCallback = Arc::new(callback);
        let mut registry = self.registry.write();

        if let Some(watch) = registry.maps.get(path) {
            watch.add_callback(callback);
            return Ok(());
        }

        let watch = MapKeyWatch::new(path, &self.current(), &self.pool, callback)?;
        registry.maps.insert(path.to_string(), Arc::new(watch));
        tracing::debug!(path, "map watch registered");
        Ok(())
    }

    /// Calls `callback` once per added, updated or deleted path matching
    /// `pattern`.
    ///
    /// `pattern` uses [`regex`] syntax and is matched against every
    /// flattened path, intermediate paths included. Registering the same
    /// pattern text again adds another callback to the existing watch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if `pattern` does not compile, and
    /// [`Error::Canonicalize`] if the matched values cannot be digested. In
    /// both cases no watch is created.
    pub fn on_match_key_change<F>(&self, pattern: &str, callback: F) -> Result<(), Error>
    where
        F: Fn(ConfigUpdateEvent) + Send + Sync + 'static,
    {
        let regex = Regex::new(pattern).map_err(|e| Error::invalid_pattern(pattern, e))?;
        self.on_match_regex(regex, callback)
    }

    /// Like [`on_match_key_change`](Self::on_match_key_change) with a
    /// precompiled pattern, keyed by its source text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Canonicalize`] if the matched values cannot be
    /// digested; no watch is created.
    pub fn on_match_regex<F>(&self, pattern: Regex, callback: F) -> Result<(), Error>
    where
        F: Fn(ConfigUpdateEvent) + Send + Sync + 'static,
    {
        let callback: EventCallback = Arc::new(callback);
        let mut registry = self.registry.write();

        if let Some(watch) = registry.matches.get(pattern.as_str()) {
            watch.add_callback(callback);
            return Ok(());
        }

        let key = pattern.as_str().to_string();
        let watch = MatchKeyWatch::new(pattern, &self.current(), &self.pool, callback)?;
        tracing::debug!(pattern = %key, "match watch registered");
        registry.matches.insert(key, Arc::new(watch));
        Ok(())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// The key watch registered for `path`, if any.
    #[must_use]
    pub fn key_watch(&self, path: &str) -> Option<Arc<KeyWatch>> {
        self.registry.read().keys.get(path).cloned()
    }

    /// The map watch registered for `path`, if any.
    #[must_use]
    pub fn map_watch(&self, path: &str) -> Option<Arc<MapKeyWatch>> {
        self.registry.read().maps.get(path).cloned()
    }

    /// The match watch registered for `pattern`, if any.
    #[must_use]
    pub fn match_watch(&self, pattern: &str) -> Option<Arc<MatchKeyWatch>> {
        self.registry.read().matches.get(pattern).cloned()
    }

    /// Total number of registered watches.
    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.registry.read().len()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("ConfigStore")
            .field("epoch", &self.epoch())
            .field("key_watches", &registry.keys.len())
            .field("map_watches", &registry.maps.len())
            .field("match_watches", &registry.matches.len())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ConfigStore`].
///
/// ```rust
/// use confwatch::{ConfigStore, ConfigTree, Dispatcher};
/// use serde_json::json;
///
/// let store = ConfigStore::builder()
///     .dispatcher(Dispatcher::Thread)
///     .pool_capacity(64)
///     .snapshot(ConfigTree::try_from(json!({"a": 1})).unwrap())
///     .build();
/// assert_eq!(store.get("a").and_then(|v| v.to_i64()), Some(1));
/// ```
#[derive(Debug)]
#[must_use]
pub struct ConfigStoreBuilder {
    dispatcher: Dispatcher,
    pool_capacity: usize,
    snapshot: ConfigTree,
}

impl Default for ConfigStoreBuilder {
    fn default() -> Self {
        Self {
            dispatcher: Dispatcher::default(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
            snapshot: ConfigTree::empty(),
        }
    }
}

impl ConfigStoreBuilder {
    /// Where callbacks run (default: a [`Dispatcher::Workers`] pool).
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Maximum number of idle tracking items kept for reuse
    /// (default: [`DEFAULT_POOL_CAPACITY`]). Zero disables pooling.
    pub const fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Initial snapshot (default: empty). Installing it does not count as a
    /// replacement.
    pub fn snapshot(mut self, tree: ConfigTree) -> Self {
        self.snapshot = tree;
        self
    }

    /// Builds the store.
    pub fn build(self) -> ConfigStore {
        ConfigStore {
            snapshot: RwLock::new(self.snapshot),
            epoch: AtomicU64::new(0),
            registry: RwLock::new(Registry::default()),
            pool: ItemPool::new(self.pool_capacity),
            dispatcher: self.dispatcher,
        }
    }
}

/// The process-wide default store, created empty on first use.
///
/// Prefer passing a [`ConfigStore`] explicitly; this exists for code that
/// cannot thread one through.
pub fn global() -> &'static ConfigStore {
    static GLOBAL: OnceLock<ConfigStore> = OnceLock::new();
    GLOBAL.get_or_init(ConfigStore::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(json: serde_json::Value) -> ConfigTree {
        ConfigTree::try_from(json).unwrap()
    }

    #[test]
    fn test_replace_returns_previous_and_bumps_epoch() {
        let store = ConfigStore::builder()
            .snapshot(tree(json!({"a": 1})))
            .build();
        assert_eq!(store.epoch(), 0);

        let previous = store.replace_snapshot(tree(json!({"a": 2})));
        assert_eq!(previous, tree(json!({"a": 1})));
        assert_eq!(store.get("a"), Some(Value::Integer(2)));
        assert!(store.has_changed_since(0));
        assert!(!store.has_changed_since(1));
    }

    #[test]
    fn test_replace_if_changed_skips_equal_content() {
        let store = ConfigStore::builder()
            .snapshot(tree(json!({"a": {"x": 1, "y": 2}})))
            .build();
        assert!(!store.replace_if_changed(tree(json!({"a": {"y": 2, "x": 1}}))).unwrap());
        assert_eq!(store.epoch(), 0);
        assert!(store.replace_if_changed(tree(json!({"a": {"x": 1}}))).unwrap());
        assert_eq!(store.epoch(), 1);
    }

    #[test]
    fn test_registration_is_idempotent_per_target() {
        let store = ConfigStore::new();
        store.on_key_change("a", || {}).unwrap();
        store.on_key_change("a", || {}).unwrap();
        store.on_map_key_change("a", |_| {}).unwrap();
        store.on_match_key_change("^a", |_| {}).unwrap();
        store.on_match_key_change("^a", |_| {}).unwrap();

        assert_eq!(store.watch_count(), 3);
        assert_eq!(store.key_watch("a").map(|w| w.callback_count()), Some(2));
        assert_eq!(store.map_watch("a").map(|w| w.callback_count()), Some(1));
        assert_eq!(store.match_watch("^a").map(|w| w.callback_count()), Some(2));
    }

    #[test]
    fn test_invalid_pattern_registers_nothing() {
        let store = ConfigStore::new();
        let err = store.on_match_key_change("a(", |_| {}).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { ref pattern, .. } if pattern == "a("));
        assert_eq!(store.watch_count(), 0);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(global(), global()));
    }
}
