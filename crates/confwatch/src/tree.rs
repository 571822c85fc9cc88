//! Immutable configuration snapshots.
//!
//! A [`ConfigTree`] wraps one [`Value`] behind an `Arc`, so cloning a
//! snapshot is cheap and a snapshot never changes once built. Replacing the
//! configuration always means building a new tree.
//!
//! # Paths
//!
//! Nodes are addressed by dot-separated paths. Map keys are looked up by
//! name and list elements by decimal index:
//!
//! ```rust
//! use confwatch::ConfigTree;
//! use serde_json::json;
//!
//! let tree = ConfigTree::try_from(json!({"a": {"x": [{"abc": 1}]}})).unwrap();
//! assert_eq!(tree.get("a.x.0.abc").and_then(|v| v.to_i64()), Some(1));
//! assert!(tree.get("a.y").is_none());
//! assert_eq!(tree.flattened_paths(), vec!["a", "a.x", "a.x.0", "a.x.0.abc"]);
//! ```
//!
//! Keys that themselves contain a `.` cannot be addressed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::digest::Digest;
use crate::error::Error;
use crate::value::Value;

/// Path segment separator.
pub const PATH_SEPARATOR: char = '.';

/// Joins a parent path and a child segment.
///
/// The separator is always inserted: an empty `parent` is the empty-string
/// key, not the root, so `join_path("", "x")` is `".x"`. Top-level paths are
/// just the key itself.
#[must_use]
pub fn join_path(parent: &str, child: &str) -> String {
    let mut path = String::with_capacity(parent.len() + 1 + child.len());
    path.push_str(parent);
    path.push(PATH_SEPARATOR);
    path.push_str(child);
    path
}

/// One immutable version of the configuration.
#[derive(Clone)]
pub struct ConfigTree {
    root: Arc<Value>,
}

impl ConfigTree {
    /// A snapshot with no keys.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            root: Arc::new(Value::empty_map()),
        }
    }

    /// Builds a snapshot from a root value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRoot`] if `value` is not a map.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Map(_) => Ok(Self {
                root: Arc::new(value),
            }),

            other => Err(Error::InvalidRoot {
                found: other.type_name(),
            }),
        }
    }

    /// The root value. Always a map for top-level snapshots; a subtree may be
    /// rooted at a list.
    #[must_use]
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Looks up the value at `path`, or `None` if any segment is missing.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split(PATH_SEPARATOR)
            .try_fold(&*self.root, |node, segment| node.child(segment))
    }

    /// Returns `true` if a value exists at `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// The map or list at `path` as its own snapshot.
    ///
    /// Returns `None` when the path is missing or holds a scalar.
    #[must_use]
    pub fn subtree(&self, path: &str) -> Option<ConfigTree> {
        self.get(path)
            .filter(|value| value.is_structured())
            .map(|value| ConfigTree {
                root: Arc::new(value.clone()),
            })
    }

    /// Every addressable path, in depth-first pre-order.
    ///
    /// Intermediate paths are included, so the set holds every prefix of
    /// every concrete value path. Empty maps and lists contribute nothing.
    #[must_use]
    pub fn flattened_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (key, child) in children(&self.root) {
            flatten_into(&key, child, &mut out);
        }
        out
    }

    /// Canonical content digest of the whole snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Canonicalize`] if the tree cannot be serialized.
    pub fn digest(&self) -> Result<Digest, Error> {
        Digest::of(&self.root)
    }

    /// Compares two snapshots by content digest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Canonicalize`] if either tree cannot be serialized.
    pub fn same_content(&self, other: &ConfigTree) -> Result<bool, Error> {
        if Arc::ptr_eq(&self.root, &other.root) {
            return Ok(true);
        }
        Ok(self.digest()? == other.digest()?)
    }

    /// Returns `true` if both handles point at the same snapshot instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &ConfigTree) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }
}

/// Child segments of a node with their values.
fn children(node: &Value) -> Vec<(String, &Value)> {
    match node {
        Value::Map(m) => m.iter().map(|(k, v)| (k.clone(), v)).collect(),

        Value::List(l) => l.iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),

        _ => Vec::new(),
    }
}

/// Pushes `path` and its descendants; returns `false` (and pushes nothing)
/// when the subtree holds no concrete value.
fn flatten_into(path: &str, node: &Value, out: &mut Vec<String>) -> bool {
    let mark = out.len();
    out.push(path.to_string());

    if !node.is_structured() {
        return true;
    }

    let mut any = false;
    for (segment, child) in children(node) {
        any |= flatten_into(&join_path(path, &segment), child, out);
    }

    if !any {
        out.truncate(mark);
    }
    any
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<BTreeMap<String, Value>> for ConfigTree {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self {
            root: Arc::new(Value::Map(map)),
        }
    }
}

impl TryFrom<Value> for ConfigTree {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl TryFrom<serde_json::Value> for ConfigTree {
    type Error = Error;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        Self::from_value(Value::from(json))
    }
}

impl PartialEq for ConfigTree {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.root == other.root
    }
}

// Manual Debug impl to keep large snapshots out of logs
impl fmt::Debug for ConfigTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigTree")
            .field("type", &self.root.type_name())
            .field("children", &self.root.child_keys().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(json: serde_json::Value) -> ConfigTree {
        ConfigTree::try_from(json).unwrap()
    }

    #[test]
    fn test_get_nested() {
        let t = tree(json!({"a": {"x": [{"abc": 1}, {"abc": 2}]}, "b": "s"}));
        assert_eq!(t.get("a.x.1.abc"), Some(&Value::Integer(2)));
        assert_eq!(t.get("b"), Some(&Value::from("s")));
        assert_eq!(t.get("b.c"), None);
        assert_eq!(t.get("a.x.9"), None);
        assert_eq!(t.get(""), None);
    }

    #[test]
    fn test_subtree_only_for_structured() {
        let t = tree(json!({"a": {"x": 1}, "l": [1, 2], "s": 3}));
        let sub = t.subtree("a").unwrap();
        assert_eq!(sub.get("x"), Some(&Value::Integer(1)));
        assert_eq!(t.subtree("l").unwrap().get("1"), Some(&Value::Integer(2)));
        assert!(t.subtree("s").is_none());
        assert!(t.subtree("missing").is_none());
    }

    #[test]
    fn test_flattened_paths_include_prefixes() {
        let t = tree(json!({
            "a": {"x": [{"abc": 1}, {"abc": 2}]},
            "b": {"1": 5, "c": 6}
        }));
        assert_eq!(
            t.flattened_paths(),
            vec![
                "a", "a.x", "a.x.0", "a.x.0.abc", "a.x.1", "a.x.1.abc", "b", "b.1", "b.c",
            ]
        );
    }

    #[test]
    fn test_flattened_paths_skip_empty_containers() {
        let t = tree(json!({"a": {}, "b": [], "c": {"d": {}}, "n": null}));
        assert_eq!(t.flattened_paths(), vec!["n"]);
    }

    #[test]
    fn test_from_value_rejects_scalar_root() {
        let err = ConfigTree::from_value(Value::from(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidRoot { found: "integer" }));
        assert!(ConfigTree::try_from(json!([1])).is_err());
    }

    #[test]
    fn test_same_content() {
        let a = tree(json!({"x": {"b": 1, "a": 2}}));
        let b = tree(json!({"x": {"a": 2, "b": 1}}));
        let c = tree(json!({"x": {"a": 2}}));
        assert!(a.same_content(&b).unwrap());
        assert!(!a.same_content(&c).unwrap());
        assert!(a.same_content(&a.clone()).unwrap());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "a"), ".a");
        assert_eq!(join_path("a.b", "0"), "a.b.0");
    }

    #[test]
    fn test_flatten_below_empty_key() {
        let t = tree(json!({"": {"x": 1}, "a": {"": 2}}));
        let paths = t.flattened_paths();
        assert_eq!(paths, vec!["", ".x", "a", "a."]);
        for path in &paths {
            assert!(t.contains(path), "unresolvable path {path:?}");
        }
        assert_eq!(t.get(".x"), Some(&Value::Integer(1)));
    }
}
