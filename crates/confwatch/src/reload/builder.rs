//! Builder for file reloading.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::handle::ReloadHandle;
use super::source::{FileSource, load_all};
use super::types::WatchError;
use super::watcher::{ErrorCallback, ReloadWatcher};
use crate::store::ConfigStore;

/// Builder for a file reloader feeding one [`ConfigStore`].
///
/// Files are merged in the order they are added, later files taking
/// precedence, exactly like [`Layers`](crate::Layers).
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use confwatch::ConfigStore;
/// use confwatch::reload::ReloadBuilder;
///
/// let store = Arc::new(ConfigStore::new());
/// let handle = ReloadBuilder::new(Arc::clone(&store))
///     .file("config.toml")
///     .optional_file("config.local.toml")
///     .debounce(Duration::from_millis(200))
///     .on_error(|err| eprintln!("reload failed: {err}"))
///     .build()?;
///
/// store.on_key_change("server.port", || println!("port changed"))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[must_use]
pub struct ReloadBuilder {
    store: Arc<ConfigStore>,

    sources: Vec<FileSource>,

    /// Debounce duration (default: 100ms).
    debounce: Duration,

    on_error: Option<ErrorCallback>,
}

impl ReloadBuilder {
    /// Creates a builder for `store` with no files and a 100ms debounce.
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            sources: Vec::new(),
            debounce: Duration::from_millis(100),
            on_error: None,
        }
    }

    /// Adds a required file at the root of the tree.
    ///
    /// Loading fails while the file is missing.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.sources.push(FileSource::new(path, None, true));
        self
    }

    /// Adds a required file nested under the dot path `prefix`.
    pub fn file_with_prefix(mut self, path: impl AsRef<Path>, prefix: &str) -> Self {
        self.sources.push(FileSource::new(path, Some(prefix), true));
        self
    }

    /// Adds a file that is skipped while it does not exist.
    ///
    /// Creating the file later triggers a reload.
    pub fn optional_file(mut self, path: impl AsRef<Path>) -> Self {
        self.sources.push(FileSource::new(path, None, false));
        self
    }

    /// Sets how long to wait after the last file event before reloading.
    ///
    /// Editors often emit several events for one save.
    pub const fn debounce(mut self, duration: Duration) -> Self {
        self.debounce = duration;
        self
    }

    /// Registers a callback for failed reloads.
    ///
    /// The previous snapshot stays current whenever this is called. The
    /// callback runs on the reloader thread.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(WatchError) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Loads every file once, installs the result and starts watching.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if:
    /// - no files were added
    /// - the initial load failed
    /// - the file watcher could not be set up
    pub fn build(self) -> Result<ReloadHandle, WatchError> {
        if self.sources.is_empty() {
            return Err(WatchError::init_failed("no files specified to watch", None));
        }

        let initial = load_all(&self.sources)
            .map_err(|e| WatchError::reload_failed("initial configuration load failed", vec![e]))?;
        self.store.replace_if_changed(initial).map_err(|e| {
            WatchError::reload_failed("initial configuration could not be installed", vec![e])
        })?;

        let watcher = ReloadWatcher::start(self.store, self.sources, self.debounce, self.on_error)?;
        Ok(ReloadHandle::new(watcher))
    }
}

impl std::fmt::Debug for ReloadBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadBuilder")
            .field("sources", &self.sources)
            .field("debounce", &self.debounce)
            .field("on_error", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}
