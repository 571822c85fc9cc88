//! Change watches over a [`ConfigStore`](crate::ConfigStore).
//!
//! Three granularities are supported:
//!
//! | Watch | Observes | Callback payload |
//! |-------|----------|------------------|
//! | [`KeyWatch`] | one exact path | none |
//! | [`MapKeyWatch`] | the children of one map or list | [`ConfigUpdateEvent`] per child |
//! | [`MatchKeyWatch`] | every flattened path matching a regex | [`ConfigUpdateEvent`] per path |
//!
//! Each watch keeps its baseline behind its own mutex, so two overlapping
//! snapshot replacements serialise on the same watch while different watches
//! diff independently. Callbacks live behind a separate lock so registering
//! another callback never waits for a diff in progress.
//!
//! # Diff cycle
//!
//! ```text
//! lock watch ─▶ read current snapshot ─▶ collect events ─▶ update baseline ─▶ unlock
//!                                                                 │
//!                                                                 ▼
//!                                                  dispatch callbacks (fire-and-forget)
//! ```

mod item;
mod key;
mod map;
mod matcher;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::event::{ConfigUpdateEvent, EventOp};
use crate::tree::ConfigTree;

pub use item::DEFAULT_POOL_CAPACITY;
pub use key::KeyWatch;
pub use map::MapKeyWatch;
pub use matcher::MatchKeyWatch;

pub(crate) use item::ItemPool;
use item::WatchItem;

/// Callback for exact-key watches.
pub type KeyCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Callback for map and match watches.
pub type EventCallback = Arc<dyn Fn(ConfigUpdateEvent) + Send + Sync + 'static>;

/// Everything a watch needs from the store during one check.
pub(crate) struct WatchContext<'a> {
    pub snapshot: &'a RwLock<ConfigTree>,
    pub pool: &'a ItemPool,
    pub dispatcher: &'a Dispatcher,
}

impl WatchContext<'_> {
    /// The snapshot that is current right now.
    pub(crate) fn current(&self) -> ConfigTree {
        self.snapshot.read().clone()
    }
}

/// A registered watch that can diff itself against the current snapshot.
pub(crate) trait Watch: Send + Sync {
    /// Path or pattern the watch was registered under.
    fn target(&self) -> &str;

    /// Diffs against the current snapshot and dispatches callbacks.
    ///
    /// Returns the number of callback invocations dispatched. On error the
    /// baseline is left as it was.
    fn check_and_notify(&self, ctx: &WatchContext<'_>) -> Result<usize, Error>;
}

/// Append-only callback list.
pub(crate) struct Callbacks<C> {
    inner: RwLock<Vec<C>>,
}

impl<C: Clone> Callbacks<C> {
    pub(crate) fn new(first: C) -> Self {
        Self {
            inner: RwLock::new(vec![first]),
        }
    }

    pub(crate) fn push(&self, callback: C) {
        self.inner.write().push(callback);
    }

    pub(crate) fn snapshot(&self) -> Vec<C> {
        self.inner.read().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().len()
    }
}

/// A currently present key: `(key, full path)`.
pub(crate) type Entry = (String, String);

/// Diffs tracked items against the keys present in `tree`.
///
/// Emits `Update` for tracked keys whose item changed, `Add` for keys not
/// tracked yet and `Delete` for tracked keys that are gone. Pure: neither
/// the tracked items nor the tree are modified.
pub(crate) fn diff_entries(
    tracked: &BTreeMap<String, WatchItem>,
    current: &[Entry],
    tree: &ConfigTree,
) -> Result<Vec<ConfigUpdateEvent>, Error> {
    let mut events = Vec::new();

    for (key, full_path) in current {
        match tracked.get(key) {
            Some(item) => {
                if item.is_changed(tree)? {
                    events.push(ConfigUpdateEvent::new(item.path(), key, EventOp::Update));
                }
            }

            None => events.push(ConfigUpdateEvent::new(full_path, key, EventOp::Add)),
        }
    }

    let present: HashSet<&str> = current.iter().map(|(key, _)| key.as_str()).collect();
    for (key, item) in tracked {
        if !present.contains(key.as_str()) {
            events.push(ConfigUpdateEvent::new(item.path(), key, EventOp::Delete));
        }
    }

    Ok(events)
}

/// Builds a fresh set of tracked items for `entries` against `tree`.
///
/// The previous items are only returned to the pool once every new item
/// reloaded successfully, so a failure leaves `tracked` untouched.
pub(crate) fn rebuild_entries(
    pool: &ItemPool,
    tracked: &mut BTreeMap<String, WatchItem>,
    entries: &[Entry],
    tree: &ConfigTree,
) -> Result<(), Error> {
    let mut fresh = BTreeMap::new();
    for (key, full_path) in entries {
        let mut item = pool.acquire(full_path);
        if let Err(e) = item.reload(tree) {
            pool.release(item);
            pool.release_all(fresh.into_values());
            return Err(e);
        }
        fresh.insert(key.clone(), item);
    }

    let old = std::mem::replace(tracked, fresh);
    pool.release_all(old.into_values());
    Ok(())
}

/// Dispatches every event to every callback.
pub(crate) fn dispatch_events(
    dispatcher: &Dispatcher,
    callbacks: &[EventCallback],
    events: &[ConfigUpdateEvent],
) -> usize {
    for event in events {
        for callback in callbacks {
            let callback = Arc::clone(callback);
            let event = event.clone();
            dispatcher.dispatch(move || callback(event));
        }
    }
    events.len() * callbacks.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(json: serde_json::Value) -> ConfigTree {
        ConfigTree::try_from(json).unwrap()
    }

    fn entries(keys: &[&str]) -> Vec<Entry> {
        keys.iter()
            .map(|k| (k.to_string(), format!("p.{k}")))
            .collect()
    }

    #[test]
    fn test_diff_entries_add_update_delete() {
        let pool = ItemPool::default();
        let before = tree(json!({"p": {"a": 1, "b": 2, "c": 3}}));
        let after = tree(json!({"p": {"a": 1, "b": 20, "d": 4}}));

        let mut tracked = BTreeMap::new();
        rebuild_entries(&pool, &mut tracked, &entries(&["a", "b", "c"]), &before).unwrap();

        let mut events = diff_entries(&tracked, &entries(&["a", "b", "d"]), &after).unwrap();
        events.sort();
        assert_eq!(
            events,
            vec![
                ConfigUpdateEvent::new("p.b", "b", EventOp::Update),
                ConfigUpdateEvent::new("p.c", "c", EventOp::Delete),
                ConfigUpdateEvent::new("p.d", "d", EventOp::Add),
            ]
        );
    }

    #[test]
    fn test_rebuild_returns_old_items_to_pool() {
        let pool = ItemPool::default();
        let t = tree(json!({"p": {"a": 1, "b": 2}}));
        let mut tracked = BTreeMap::new();

        rebuild_entries(&pool, &mut tracked, &entries(&["a", "b"]), &t).unwrap();
        assert_eq!(pool.idle(), 0);

        rebuild_entries(&pool, &mut tracked, &entries(&["a"]), &t).unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_callbacks_append() {
        let first: KeyCallback = Arc::new(|| {});
        let callbacks = Callbacks::new(first);
        callbacks.push(Arc::new(|| {}));
        assert_eq!(callbacks.len(), 2);
        assert_eq!(callbacks.snapshot().len(), 2);
    }
}
