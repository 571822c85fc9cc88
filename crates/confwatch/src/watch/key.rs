//! Exact-path watch.

use std::sync::Arc;

use parking_lot::Mutex;

use super::item::WatchItem;
use super::{Callbacks, KeyCallback, Watch, WatchContext};
use crate::error::Error;
use crate::tree::ConfigTree;

/// Watches one exact path and fires a plain "changed" signal.
///
/// Callbacks receive no payload; read the store to get the new value.
pub struct KeyWatch {
    path: String,
    state: Mutex<WatchItem>,
    callbacks: Callbacks<KeyCallback>,
}

impl KeyWatch {
    /// Creates the watch with `tree` as its baseline.
    pub(crate) fn new(path: &str, tree: &ConfigTree, callback: KeyCallback) -> Result<Self, Error> {
        let mut item = WatchItem::new(path);
        item.reload(tree)?;
        Ok(Self {
            path: path.to_string(),
            state: Mutex::new(item),
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

    pub(crate) fn add_callback(&self, callback: KeyCallback) {
        self.callbacks.push(callback);
    }
}

impl Watch for KeyWatch {
    fn target(&self) -> &str {
        &self.path
    }

    fn check_and_notify(&self, ctx: &WatchContext<'_>) -> Result<usize, Error> {
        {
            let mut item = self.state.lock();
            let tree = ctx.current();
            let now = item.observe(&tree)?;
            if !item.differs_from(&now) {
                return Ok(0);
            }
            item.accept(now);
        }

        let callbacks = self.callbacks.snapshot();
        for callback in &callbacks {
            let callback = Arc::clone(callback);
            ctx.dispatcher.dispatch(move || callback());
        }
        Ok(callbacks.len())
    }
}

impl std::fmt::Debug for KeyWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyWatch")
            .field("path", &self.path)
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::watch::ItemPool;
    use parking_lot::RwLock;
    use serde_json::json;

    fn tree(json: serde_json::Value) -> ConfigTree {
        ConfigTree::try_from(json).unwrap()
    }

    fn noop() -> KeyCallback {
        Arc::new(|| {})
    }

    #[test]
    fn test_fires_once_per_change() {
        let snapshot = RwLock::new(tree(json!({"port": 80})));
        let pool = ItemPool::default();
        let dispatcher = Dispatcher::Thread;
        let ctx = WatchContext {
            snapshot: &snapshot,
            pool: &pool,
            dispatcher: &dispatcher,
        };

        let watch = KeyWatch::new("port", &snapshot.read(), noop()).unwrap();
        watch.add_callback(noop());
        assert_eq!(watch.check_and_notify(&ctx).unwrap(), 0);

        *snapshot.write() = tree(json!({"port": 81}));
        assert_eq!(watch.check_and_notify(&ctx).unwrap(), 2);
        assert_eq!(watch.check_and_notify(&ctx).unwrap(), 0);
    }

    #[test]
    fn test_missing_path_appearing() {
        let snapshot = RwLock::new(tree(json!({})));
        let pool = ItemPool::default();
        let dispatcher = Dispatcher::Thread;
        let ctx = WatchContext {
            snapshot: &snapshot,
            pool: &pool,
            dispatcher: &dispatcher,
        };

        let watch = KeyWatch::new("a.b", &snapshot.read(), noop()).unwrap();
        assert_eq!(watch.path(), "a.b");

        *snapshot.write() = tree(json!({"a": {"c": 1}}));
        assert_eq!(watch.check_and_notify(&ctx).unwrap(), 0);

        *snapshot.write() = tree(json!({"a": {"b": [1]}}));
        assert_eq!(watch.check_and_notify(&ctx).unwrap(), 1);
    }
}
