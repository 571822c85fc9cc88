//! Merging several sources into one snapshot.
//!
//! Layers are applied in the order they were added; later layers take
//! precedence. Maps merge key by key, recursively. Any other value in a
//! later layer replaces whatever an earlier layer had at that path,
//! including a whole map or list.
//!
//! ```rust
//! use confwatch::{ConfigTree, Layers};
//! use serde_json::json;
//!
//! let base = ConfigTree::try_from(json!({"db": {"host": "localhost", "port": 5432}})).unwrap();
//! let local = ConfigTree::try_from(json!({"db": {"port": 5433}})).unwrap();
//! let flags = ConfigTree::try_from(json!({"beta": true})).unwrap();
//!
//! let merged = Layers::new()
//!     .layer(base)
//!     .layer(local)
//!     .prefixed("features", flags)
//!     .merge();
//!
//! assert_eq!(merged.get("db.host").and_then(|v| v.as_str()), Some("localhost"));
//! assert_eq!(merged.get("db.port").and_then(|v| v.to_i64()), Some(5433));
//! assert_eq!(merged.get("features.beta").and_then(|v| v.as_bool()), Some(true));
//! ```

use std::collections::BTreeMap;

use crate::tree::{ConfigTree, PATH_SEPARATOR};
use crate::value::Value;

/// An ordered list of snapshots to merge.
#[derive(Clone, Debug, Default)]
pub struct Layers {
    layers: Vec<(Option<String>, ConfigTree)>,
}

impl Layers {
    /// Creates an empty layer list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer at the root.
    #[must_use]
    pub fn layer(mut self, tree: ConfigTree) -> Self {
        self.push(None, tree);
        self
    }

    /// Adds a layer nested under `prefix`.
    ///
    /// `prefix` is a dot-separated path; intermediate maps are created as
    /// needed. An empty prefix is the same as [`layer`](Self::layer).
    #[must_use]
    pub fn prefixed(mut self, prefix: &str, tree: ConfigTree) -> Self {
        self.push(Some(prefix), tree);
        self
    }

    /// Adds a layer in place.
    pub fn push(&mut self, prefix: Option<&str>, tree: ConfigTree) {
        let prefix = prefix.filter(|p| !p.is_empty()).map(str::to_string);
        self.layers.push((prefix, tree));
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if no layer was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Merges every layer into a new snapshot.
    #[must_use]
    pub fn merge(&self) -> ConfigTree {
        let mut root = BTreeMap::new();

        for (prefix, tree) in &self.layers {
            let Value::Map(map) = tree.root().clone() else {
                continue;
            };

            let overlay = match prefix {
                Some(prefix) => nest_under(prefix, map),
                None => map,
            };
            deep_merge(&mut root, overlay);
        }

        ConfigTree::from(root)
    }
}

/// Wraps `map` in one single-key map per segment of `prefix`.
fn nest_under(prefix: &str, map: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    prefix
        .rsplit(PATH_SEPARATOR)
        .fold(map, |inner, segment| {
            BTreeMap::from([(segment.to_string(), Value::Map(inner))])
        })
}

/// Deep merges `overlay` into `base`, with `overlay` taking precedence.
pub(crate) fn deep_merge(base: &mut BTreeMap<String, Value>, overlay: BTreeMap<String, Value>) {
    for (key, overlay_value) in overlay {
        match (base.get_mut(&key), overlay_value) {
            (Some(Value::Map(base_map)), Value::Map(overlay_map)) => {
                deep_merge(base_map, overlay_map);
            }

            (_, overlay_value) => {
                base.insert(key, overlay_value);
            }
        }
    }
}
