//! Reloading a store from configuration files.
//!
//! Enabled with the `watch` feature. A reloader parses a list of files,
//! merges them with [`Layers`](crate::Layers) and installs the result with
//! [`ConfigStore::replace_if_changed`](crate::ConfigStore::replace_if_changed),
//! so watches only fire when the merged content actually changed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌────────────────────┐
//! │   notify    │────▶│ reloader thread │────▶│    ConfigStore     │
//! │  (events)   │     │   (debounce)    │     │ replace_if_changed │
//! └─────────────┘     └─────────────────┘     └────────────────────┘
//!                            ▲                        │
//!                            │                        ▼
//!                     ┌─────────────┐          ┌─────────────┐
//!                     │ReloadHandle │          │   watches   │
//!                     │reload / stop│          │ (callbacks) │
//!                     └─────────────┘          └─────────────┘
//! ```
//!
//! # Error Handling
//!
//! When a reload fails (for example a file no longer parses), the previous
//! snapshot is retained, the failure is logged and passed to the
//! [`on_error`](ReloadBuilder::on_error) callback if one is registered.

mod builder;
mod handle;
mod source;
mod types;
mod watcher;

pub use builder::ReloadBuilder;
pub use handle::ReloadHandle;
pub use types::WatchError;
pub use watcher::ErrorCallback;
