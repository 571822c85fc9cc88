//! Child-set watch over one map or list.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::item::{ItemPool, WatchItem};
use super::{
    Callbacks, Entry, EventCallback, Watch, WatchContext, diff_entries, dispatch_events,
    rebuild_entries,
};
use crate::error::Error;
use crate::tree::{ConfigTree, join_path};
use crate::value::Value;

/// Watches the immediate children of one path.
///
/// When the value at the path is a map its keys are the children; when it
/// is a list its indices are. Each transition is reported as one
/// [`ConfigUpdateEvent`](crate::ConfigUpdateEvent) per added, updated or
/// deleted child.
pub struct MapKeyWatch {
    path: String,
    state: Mutex<MapState>,
    callbacks: Callbacks<EventCallback>,
}

struct MapState {
    /// Baseline of the watched path itself.
    parent: WatchItem,

    /// Child key → baseline of `<path>.<key>`.
    children: BTreeMap<String, WatchItem>,
}

impl MapKeyWatch {
    /// Creates the watch with `tree` as its baseline.
    pub(crate) fn new(
        path: &str,
        tree: &ConfigTree,
        pool: &ItemPool,
        callback: EventCallback,
    ) -> Result<Self, Error> {
        let mut parent = WatchItem::new(path);
        parent.reload(tree)?;

        let mut children = BTreeMap::new();
        rebuild_entries(pool, &mut children, &child_entries(path, tree), tree)?;

        Ok(Self {
            path: path.to_string(),
            state: Mutex::new(MapState { parent, children }),
            callbacks: Callbacks::new(callback),
        })
    }

    /// The watched path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Child keys tracked as of the last reload.
    #[must_use]
    pub fn tracked_keys(&self) -> Vec<String> {
        self.state.lock().children.keys().cloned().collect()
    }

    pub(crate) fn add_callback(&self, callback: EventCallback) {
        self.callbacks.push(callback);
    }
}

/// `(child key, full path)` for every child currently under `path`.
fn child_entries(path: &str, tree: &ConfigTree) -> Vec<Entry> {
    tree.get(path)
        .map(Value::child_keys)
        .unwrap_or_default()
        .into_iter()
        .map(|key| {
            let full_path = join_path(path, &key);
            (key, full_path)
        })
        .collect()
}

impl Watch for MapKeyWatch {
    fn target(&self) -> &str {
        &self.path
    }

    fn check_and_notify(&self, ctx: &WatchContext<'_>) -> Result<usize, Error> {
        let events = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let tree = ctx.current();

            let now = state.parent.observe(&tree)?;
            if !state.parent.differs_from(&now) {
                return Ok(0);
            }

            let entries = child_entries(&self.path, &tree);
            let events = diff_entries(&state.children, &entries, &tree)?;
            if !events.is_empty() {
                rebuild_entries(ctx.pool, &mut state.children, &entries, &tree)?;
            }
            state.parent.accept(now);
            events
        };

        tracing::trace!(path = %self.path, events = events.len(), "map watch diffed");
        Ok(dispatch_events(
            ctx.dispatcher,
            &self.callbacks.snapshot(),
            &events,
        ))
    }
}

impl std::fmt::Debug for MapKeyWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapKeyWatch")
            .field("path", &self.path)
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}
