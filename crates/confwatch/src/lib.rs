//! # confwatch
//!
//! Live, hierarchical configuration snapshots with change watches.
//!
//! A [`ConfigStore`] holds the current [`ConfigTree`]. Whatever loads the
//! configuration (files, a remote service, a test) hands the store a new
//! snapshot through [`ConfigStore::replace_snapshot`]; the store then works
//! out which watched parts changed and notifies their observers.
//!
//! ## Watch Granularities
//!
//! | Registration | Fires when | Callback receives |
//! |--------------|------------|-------------------|
//! | [`on_key_change`](ConfigStore::on_key_change) | the value at one path changed | nothing |
//! | [`on_map_key_change`](ConfigStore::on_map_key_change) | children of a map or list were added, updated or deleted | one [`ConfigUpdateEvent`] per child |
//! | [`on_match_key_change`](ConfigStore::on_match_key_change) | flattened paths matching a regex were added, updated or deleted | one [`ConfigUpdateEvent`] per path |
//!
//! ## Quick Start
//!
//! ```rust
//! use confwatch::{ConfigStore, ConfigTree, EventOp};
//! use serde_json::json;
//!
//! let store = ConfigStore::builder()
//!     .snapshot(ConfigTree::try_from(json!({"pool": {"a": 1}})).unwrap())
//!     .build();
//!
//! store
//!     .on_map_key_change("pool", |event| {
//!         if event.op == EventOp::Add {
//!             println!("new pool member {}", event.sub_key);
//!         }
//!     })
//!     .unwrap();
//!
//! store.replace_snapshot(ConfigTree::try_from(json!({"pool": {"a": 1, "b": 2}})).unwrap());
//! ```
//!
//! ## Change Detection
//!
//! Each watched path keeps a baseline: the value itself for scalars, a
//! SHA-256 [`Digest`] of the canonical serialization for maps and lists.
//! Map key order never matters; list order does. Turning a map or list
//! into a scalar (or back) is always a change, and an explicit null is
//! distinct from a missing key.
//!
//! ## Delivery
//!
//! Callbacks are fire-and-forget. They run on a [`Dispatcher`], never on
//! the thread that replaced the snapshot, carry no ordering guarantee, and
//! a panicking callback is caught and logged. Logging goes through
//! [`tracing`]; the crate never installs a subscriber.
//!
//! ## Feature Flags
//!
//! | Feature | Description | Default |
//! |---------|-------------|---------|
//! | `toml` | TOML file parsing | **Yes** |
//! | `yaml` | YAML file parsing | No |
//! | `file-all` | All file formats (JSON is always available) | No |
//! | `watch` | Reload a store when files change | No |
//! | `async` | `Dispatcher::Tokio` for running callbacks on a tokio runtime | No |
//! | `full` | Enable all features | No |
//!
//! ## Error Handling
//!
//! All errors are reported through the [`Error`] type, which integrates with
//! [`miette`] for rich terminal diagnostics:
//!
//! ```rust
//! use confwatch::ConfigStore;
//!
//! let store = ConfigStore::new();
//! if let Err(e) = store.on_match_key_change("servers.(", |_| {}) {
//!     eprintln!("{:?}", miette::Report::from(e));
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Re-export miette for error handling.
pub use miette;

// ============================================================================
// Core Modules
// ============================================================================

mod digest;
mod dispatch;
mod error;
mod event;
mod layer;
mod store;
mod tree;
mod value;

pub mod file;
pub mod watch;

pub use digest::Digest;
pub use dispatch::{Dispatcher, WorkerPool};
pub use error::Error;
pub use event::{ConfigUpdateEvent, EventOp};
pub use layer::Layers;
pub use store::{ConfigStore, ConfigStoreBuilder, global};
pub use tree::{ConfigTree, PATH_SEPARATOR, join_path};
pub use value::Value;
pub use watch::{KeyWatch, MapKeyWatch, MatchKeyWatch};

/// Result type for fallible store and file operations.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// File Reload
// ============================================================================

#[cfg(feature = "watch")]
pub mod reload;

#[cfg(feature = "watch")]
pub use reload::{ReloadBuilder, ReloadHandle, WatchError};
