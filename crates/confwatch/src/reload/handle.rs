//! User-facing handle for a running reloader.

use std::sync::Arc;

use super::types::WatchError;
use super::watcher::ReloadWatcher;
use crate::store::ConfigStore;

/// Handle for controlling a running file reloader.
///
/// Cheap to clone; every clone controls the same reloader. The watcher
/// thread stops when [`stop`](Self::stop) is called or the last clone is
/// dropped.
///
/// ```rust,ignore
/// let epoch = handle.epoch();
/// handle.reload()?;
/// // ... later ...
/// if handle.store().has_changed_since(epoch) {
///     println!("configuration was reloaded");
/// }
/// handle.stop();
/// ```
#[derive(Clone)]
pub struct ReloadHandle {
    watcher: Arc<ReloadWatcher>,
}

impl ReloadHandle {
    pub(crate) fn new(watcher: ReloadWatcher) -> Self {
        Self {
            watcher: Arc::new(watcher),
        }
    }

    /// The store this reloader feeds.
    #[must_use]
    pub fn store(&self) -> &Arc<ConfigStore> {
        self.watcher.store()
    }

    /// The store's current epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.store().epoch()
    }

    /// Asks the reloader thread to reload every file now.
    ///
    /// Returns once the request is queued; the reload itself runs on the
    /// reloader thread and only replaces the snapshot if content changed.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Stopped`] if the reloader has been stopped,
    /// or [`WatchError::ChannelError`] if the request could not be queued.
    pub fn reload(&self) -> Result<(), WatchError> {
        self.watcher.request_reload()
    }

    /// Stops watching. The store keeps its last snapshot.
    pub fn stop(&self) {
        self.watcher.stop();
    }

    /// Returns `false` once the reloader has stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.watcher.is_running()
    }
}

impl std::fmt::Debug for ReloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadHandle")
            .field("epoch", &self.epoch())
            .field("running", &self.is_running())
            .finish()
    }
}
