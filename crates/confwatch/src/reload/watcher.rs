//! Background thread that turns file events into snapshot replacements.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, select};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::source::{FileSource, load_all};
use super::types::{ReloadTrigger, WatchError};
use crate::store::ConfigStore;

/// Callback type for reload errors.
pub type ErrorCallback = Box<dyn Fn(WatchError) + Send + Sync + 'static>;

/// Commands sent to the watcher thread.
#[derive(Debug, Clone)]
pub(crate) enum WatchCommand {
    /// Request a reload now.
    Reload,

    /// Stop the watcher.
    Stop,
}

/// State shared between the handle and the watcher thread.
pub(crate) struct WatcherState {
    pub store: Arc<ConfigStore>,
    pub sources: Vec<FileSource>,
    pub running: AtomicBool,
    pub on_error: Option<ErrorCallback>,
}

impl WatcherState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Owns the watcher thread; dropping it stops and joins the thread.
pub(crate) struct ReloadWatcher {
    state: Arc<WatcherState>,
    command_tx: Sender<WatchCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ReloadWatcher {
    /// Starts watching the parent directory of every source.
    pub fn start(
        store: Arc<ConfigStore>,
        sources: Vec<FileSource>,
        debounce: Duration,
        on_error: Option<ErrorCallback>,
    ) -> Result<Self, WatchError> {
        let (command_tx, command_rx) = bounded::<WatchCommand>(16);
        let (notify_tx, notify_rx) = bounded::<notify::Result<Event>>(100);
        let mut watcher = create_notify_watcher(notify_tx)?;

        let directories: HashSet<PathBuf> = sources
            .iter()
            .map(|s| watch_directory(&s.path))
            .collect::<Result<_, _>>()?;
        for dir in &directories {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| WatchError::path_error(dir, format!("failed to watch: {e}")))?;
        }

        // Event paths may be relative, absolute or canonical depending on
        // the backend; keep every spelling of each source.
        let watched_paths: HashSet<PathBuf> = sources
            .iter()
            .flat_map(|s| path_spellings(&s.path))
            .collect();

        let state = Arc::new(WatcherState {
            store,
            sources,
            running: AtomicBool::new(true),
            on_error,
        });

        let thread_state = Arc::clone(&state);
        let thread_handle = thread::Builder::new()
            .name("confwatch-reload".to_string())
            .spawn(move || {
                watcher_loop(
                    &thread_state,
                    &command_rx,
                    &notify_rx,
                    debounce,
                    &watched_paths,
                    watcher,
                );
            })
            .map_err(|e| {
                WatchError::init_failed(format!("failed to spawn watcher thread: {e}"), None)
            })?;

        tracing::debug!(
            files = state.sources.len(),
            directories = directories.len(),
            "file reloader started"
        );

        Ok(Self {
            state,
            command_tx,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.state.store
    }

    pub fn request_reload(&self) -> Result<(), WatchError> {
        if !self.state.is_running() {
            return Err(WatchError::Stopped);
        }
        self.command_tx
            .send(WatchCommand::Reload)
            .map_err(|_| WatchError::channel_error("failed to send reload command"))
    }

    pub fn stop(&self) {
        self.state.stop();
        let _ = self.command_tx.try_send(WatchCommand::Stop);
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }
}

impl Drop for ReloadWatcher {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

fn create_notify_watcher(
    tx: Sender<notify::Result<Event>>,
) -> Result<RecommendedWatcher, WatchError> {
    notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .map_err(|e| WatchError::init_failed(format!("failed to create file watcher: {e}"), Some(e)))
}

/// Directory to watch for `path`.
///
/// Watching the directory instead of the file keeps working across editors
/// that save by renaming a temporary file over the original.
fn watch_directory(path: &Path) -> Result<PathBuf, WatchError> {
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return Err(WatchError::path_error(path, "invalid path")),
    };

    if !parent.is_dir() {
        return Err(WatchError::path_error(
            path,
            "parent directory does not exist",
        ));
    }
    Ok(parent.to_path_buf())
}

fn path_spellings(path: &Path) -> Vec<PathBuf> {
    let mut spellings = vec![path.to_path_buf()];
    if let Ok(absolute) = std::path::absolute(path) {
        spellings.push(absolute);
    }
    if let Ok(canonical) = path.canonicalize() {
        spellings.push(canonical);
    }
    // A file that does not exist yet has no canonical form, but its
    // directory does.
    if let (Some(name), Ok(dir)) = (path.file_name(), watch_directory(path))
        && let Ok(dir) = dir.canonicalize()
    {
        spellings.push(dir.join(name));
    }
    spellings
}

fn watcher_loop(
    state: &Arc<WatcherState>,
    command_rx: &Receiver<WatchCommand>,
    notify_rx: &Receiver<notify::Result<Event>>,
    debounce: Duration,
    watched_paths: &HashSet<PathBuf>,
    _watcher: RecommendedWatcher,
) {
    let mut pending_reload: Option<ReloadTrigger> = None;
    let mut last_event = Instant::now();

    while state.is_running() {
        select! {
            recv(command_rx) -> cmd => {
                match cmd {
                    Ok(WatchCommand::Reload) => do_reload(state, &ReloadTrigger::Manual),

                    Ok(WatchCommand::Stop) | Err(_) => {
                        state.stop();
                        break;
                    }
                }
            }

            recv(notify_rx) -> event_result => {
                match event_result {
                    Ok(Ok(event)) => {
                        if let Some(trigger) = process_notify_event(&event, watched_paths) {
                            pending_reload = Some(trigger);
                            last_event = Instant::now();
                        }
                    }

                    Ok(Err(e)) => tracing::warn!(error = %e, "file watcher reported an error"),

                    Err(_) => {
                        state.stop();
                        break;
                    }
                }
            }

            default(debounce) => {
                if let Some(trigger) = pending_reload.take() {
                    if last_event.elapsed() >= debounce {
                        do_reload(state, &trigger);
                    } else {
                        pending_reload = Some(trigger);
                    }
                }
            }
        }
    }

    tracing::debug!("file reloader stopped");
}

/// Maps a notify event to a trigger if it touches a watched file.
fn process_notify_event(event: &Event, watched_paths: &HashSet<PathBuf>) -> Option<ReloadTrigger> {
    for path in &event.paths {
        let is_watched = watched_paths.contains(path)
            || path.canonicalize().is_ok_and(|c| watched_paths.contains(&c));

        if is_watched {
            return match event.kind {
                EventKind::Create(_) => Some(ReloadTrigger::FileCreated(path.clone())),
                EventKind::Modify(_) => Some(ReloadTrigger::FileModified(path.clone())),
                EventKind::Remove(_) => Some(ReloadTrigger::FileDeleted(path.clone())),
                _ => None,
            };
        }
    }
    None
}

/// Reloads every source and hands the result to the store.
fn do_reload(state: &WatcherState, trigger: &ReloadTrigger) {
    let result = load_all(&state.sources).and_then(|tree| state.store.replace_if_changed(tree));

    match result {
        Ok(true) => tracing::debug!(%trigger, epoch = state.store.epoch(), "configuration reloaded"),

        Ok(false) => tracing::trace!(%trigger, "reload produced identical content"),

        Err(e) => {
            tracing::error!(%trigger, error = %e, "configuration reload failed, keeping previous snapshot");
            if let Some(callback) = &state.on_error {
                callback(WatchError::reload_failed(e.to_string(), vec![e]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_watch_directory_for_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("later.json");
        assert_eq!(watch_directory(&path).unwrap(), dir.path());
        assert_eq!(
            watch_directory(Path::new("app.toml")).unwrap(),
            Path::new(".")
        );
    }

    #[test]
    fn test_watch_directory_missing_parent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope").join("app.json");
        assert!(matches!(
            watch_directory(&path),
            Err(WatchError::PathError { .. })
        ));
    }

    #[test]
    fn test_process_notify_event_filters_paths() {
        let dir = tempdir().unwrap();
        let watched = dir.path().join("app.json");
        fs::write(&watched, "{}").unwrap();
        let paths: HashSet<PathBuf> = path_spellings(&watched).into_iter().collect();

        let event = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(watched.clone());
        assert_eq!(
            process_notify_event(&event, &paths),
            Some(ReloadTrigger::FileModified(watched))
        );

        let other = Event::new(EventKind::Create(CreateKind::File))
            .add_path(dir.path().join("other.json"));
        assert_eq!(process_notify_event(&other, &paths), None);
    }

    #[test]
    fn test_do_reload_reports_errors_and_keeps_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.json");
        fs::write(&path, "{ not json").unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        let state = WatcherState {
            store: Arc::new(ConfigStore::new()),
            sources: vec![FileSource::new(&path, None, true)],
            running: AtomicBool::new(true),
            on_error: Some(Box::new(move |e| {
                let _ = tx.send(e.to_string());
            })),
        };

        do_reload(&state, &ReloadTrigger::Manual);
        assert!(rx.try_recv().unwrap().contains("reload failed"));
        assert_eq!(state.store.epoch(), 0);
    }
}
