//! Error and trigger types for file reloading.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error type for file watching and reloading.
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize the file watcher.
    #[error("failed to initialize file watcher: {message}")]
    #[diagnostic(
        code(confwatch::watch::init_failed),
        help("check that the file paths exist and are accessible")
    )]
    InitFailed {
        /// Human-readable error message.
        message: String,

        /// The underlying notify error, if available.
        #[source]
        source: Option<notify::Error>,
    },

    /// Failed to watch a specific path.
    #[error("failed to watch path '{path}': {message}")]
    #[diagnostic(
        code(confwatch::watch::path_error),
        help("ensure the file or its parent directory exists and is readable")
    )]
    PathError {
        /// The path that could not be watched.
        path: PathBuf,

        /// Human-readable error message.
        message: String,
    },

    /// Loading the configuration files failed.
    ///
    /// The previous snapshot stays current.
    #[error("configuration reload failed: {message}")]
    #[diagnostic(
        code(confwatch::watch::reload_failed),
        help("fix the configuration and save the file again; the previous snapshot remains active")
    )]
    ReloadFailed {
        /// Human-readable error message.
        message: String,

        /// The underlying errors.
        #[related]
        errors: Vec<crate::Error>,
    },

    /// The watcher has been stopped.
    #[error("watcher has been stopped")]
    #[diagnostic(
        code(confwatch::watch::stopped),
        help("build a new reloader to resume watching")
    )]
    Stopped,

    /// Channel communication error.
    #[error("internal channel error: {message}")]
    #[diagnostic(code(confwatch::watch::channel_error))]
    ChannelError {
        /// Human-readable error message.
        message: String,
    },
}

impl WatchError {
    /// Create a new `InitFailed` error.
    pub fn init_failed(message: impl Into<String>, source: Option<notify::Error>) -> Self {
        Self::InitFailed {
            message: message.into(),
            source,
        }
    }

    /// Create a new `PathError`.
    pub fn path_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::PathError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new `ReloadFailed` error.
    pub fn reload_failed(message: impl Into<String>, errors: Vec<crate::Error>) -> Self {
        Self::ReloadFailed {
            message: message.into(),
            errors,
        }
    }

    /// Create a new `ChannelError`.
    pub fn channel_error(message: impl Into<String>) -> Self {
        Self::ChannelError {
            message: message.into(),
        }
    }
}

/// What caused a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReloadTrigger {
    /// A watched file was modified.
    FileModified(PathBuf),

    /// A watched file was created (possibly recreated after deletion).
    FileCreated(PathBuf),

    /// A watched file was deleted.
    FileDeleted(PathBuf),

    /// [`ReloadHandle::reload`](super::ReloadHandle::reload) was called.
    Manual,
}

impl std::fmt::Display for ReloadTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileModified(p) => write!(f, "file modified: {}", p.display()),

            Self::FileCreated(p) => write!(f, "file created: {}", p.display()),

            Self::FileDeleted(p) => write!(f, "file deleted: {}", p.display()),

            Self::Manual => write!(f, "manual reload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_error_display() {
        let err = WatchError::init_failed("test error", None);
        assert!(err.to_string().contains("test error"));

        let err = WatchError::path_error("/test/path", "permission denied");
        assert!(err.to_string().contains("/test/path"));

        let err = WatchError::reload_failed("config invalid", vec![]);
        assert!(err.to_string().contains("config invalid"));
    }

    #[test]
    fn test_trigger_display() {
        let trigger = ReloadTrigger::FileModified(PathBuf::from("app.toml"));
        assert_eq!(trigger.to_string(), "file modified: app.toml");
        assert_eq!(ReloadTrigger::Manual.to_string(), "manual reload");
    }
}
