//! Property-based tests for change detection.
//!
//! Trees are drawn from a small key alphabet (the empty key included) so
//! that consecutive snapshots overlap heavily and every kind of transition
//! (add, update, delete, type flip, null, special floats) shows up often.

#![allow(clippy::pedantic)]

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use confwatch::{ConfigStore, ConfigTree, ConfigUpdateEvent, Digest, EventOp, Value};
use crossbeam_channel::{Receiver, unbounded};
use proptest::prelude::*;
use regex::Regex;

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(60);

// ============================================================================
// Strategies
// ============================================================================

/// Map keys, the empty key included.
const KEY: &str = "[abc]?";

fn float() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
        Just(0.0),
        Just(-0.0),
        Just(1.0),
    ]
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        (0i64..3).prop_map(Value::Integer),
        Just(Value::UnsignedInteger(u64::MAX)),
        float().prop_map(Value::Float),
        "[xy]{0,1}".prop_map(Value::String),
    ]
}

fn node() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Value::List),
            prop::collection::btree_map(KEY, inner, 0..3).prop_map(Value::Map),
        ]
    })
}

fn tree() -> impl Strategy<Value = ConfigTree> {
    prop::collection::btree_map(KEY, node(), 0..4).prop_map(ConfigTree::from)
}

// ============================================================================
// Helpers
// ============================================================================

fn drain<T: Ord>(rx: &Receiver<T>, expected: usize) -> BTreeSet<T> {
    let mut out = BTreeSet::new();
    for _ in 0..expected {
        match rx.recv_timeout(WAIT) {
            Ok(item) => {
                out.insert(item);
            }
            Err(_) => break,
        }
    }
    while let Ok(item) = rx.recv_timeout(QUIET) {
        out.insert(item);
    }
    out
}

fn child_map(value: Option<&Value>) -> BTreeMap<String, Value> {
    value
        .map(|v| {
            v.child_keys()
                .into_iter()
                .filter_map(|k| v.child(&k).cloned().map(|c| (k, c)))
                .collect()
        })
        .unwrap_or_default()
}

fn diff_ops(
    old: &BTreeMap<String, Value>,
    new: &BTreeMap<String, Value>,
) -> BTreeSet<(String, EventOp)> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter_map(|k| match (old.get(k), new.get(k)) {
            (None, Some(_)) => Some((k.clone(), EventOp::Add)),
            (Some(_), None) => Some((k.clone(), EventOp::Delete)),
            (Some(a), Some(b)) if a != b => Some((k.clone(), EventOp::Update)),
            _ => None,
        })
        .collect()
}

fn quick() -> ProptestConfig {
    ProptestConfig::with_cases(48)
}

// ============================================================================
// Tree Properties
// ============================================================================

mod tree_properties {
    use super::*;

    proptest! {
        /// Equal content gives equal digests and different content different ones
        #[test]
        fn digest_tracks_content(a in tree(), b in tree()) {
            let same = a.root() == b.root();
            prop_assert_eq!(a.digest().unwrap() == b.digest().unwrap(), same);
        }

        /// Identical content, NaN included, is never reported as a replacement
        #[test]
        fn identical_replacement_is_quiet(t in tree()) {
            let store = ConfigStore::builder().snapshot(t.clone()).build();
            prop_assert!(t.same_content(&t.clone()).unwrap());
            prop_assert!(!store.replace_if_changed(t.clone()).unwrap());
            prop_assert_eq!(store.epoch(), 0);
        }

        /// Digest of a subtree equals digest of the value it was taken from
        #[test]
        fn subtree_digest_matches_value(t in tree()) {
            for path in t.flattened_paths() {
                if let Some(sub) = t.subtree(&path) {
                    prop_assert_eq!(
                        sub.digest().unwrap(),
                        Digest::of(t.get(&path).unwrap()).unwrap()
                    );
                }
            }
        }

        /// Every flattened path resolves, and every prefix of it is present
        #[test]
        fn flattened_paths_are_prefix_closed(t in tree()) {
            let paths: BTreeSet<String> = t.flattened_paths().into_iter().collect();
            for path in &paths {
                prop_assert!(t.contains(path));
                if let Some((parent, _)) = path.rsplit_once('.') {
                    prop_assert!(paths.contains(parent), "missing prefix {parent}");
                }
            }
        }
    }
}

// ============================================================================
// Watch Properties
// ============================================================================

mod watch_properties {
    use super::*;

    const KEY_PATHS: &[&str] = &["a", "b", "", "a.a", "a.", ".b", "a.0", "b.c.a"];

    proptest! {
        #![proptest_config(quick())]

        /// A key watch fires exactly when the value at its path changed
        #[test]
        fn key_watch_fires_iff_value_changed(old in tree(), new in tree()) {
            let store = ConfigStore::builder().snapshot(old.clone()).build();
            let (tx, rx) = unbounded();
            for path in KEY_PATHS {
                let tx = tx.clone();
                store
                    .on_key_change(path, move || {
                        let _ = tx.send(*path);
                    })
                    .unwrap();
            }

            let expected: BTreeSet<&str> = KEY_PATHS
                .iter()
                .copied()
                .filter(|p| old.get(p) != new.get(p))
                .collect();

            store.replace_snapshot(new);
            prop_assert_eq!(drain(&rx, expected.len()), expected);
        }

        /// A map watch reports exactly the children that differ
        #[test]
        fn map_watch_reports_child_diff(old in tree(), new in tree()) {
            let store = ConfigStore::builder().snapshot(old.clone()).build();
            let (tx, rx) = unbounded();
            store
                .on_map_key_change("a", move |event: ConfigUpdateEvent| {
                    let _ = tx.send((event.sub_key, event.op));
                })
                .unwrap();

            let expected = diff_ops(&child_map(old.get("a")), &child_map(new.get("a")));

            store.replace_snapshot(new);
            prop_assert_eq!(drain(&rx, expected.len()), expected);
        }

        /// A match watch tracks the matching flattened paths and reports their diff
        #[test]
        fn match_watch_reports_path_diff(old in tree(), new in tree()) {
            let pattern = Regex::new(r"^(a|b\.)").unwrap();
            let store = ConfigStore::builder().snapshot(old.clone()).build();
            let (tx, rx) = unbounded();
            store
                .on_match_regex(pattern.clone(), move |event: ConfigUpdateEvent| {
                    let _ = tx.send((event.full_path, event.op));
                })
                .unwrap();

            let matching = |t: &ConfigTree| -> BTreeMap<String, Value> {
                t.flattened_paths()
                    .into_iter()
                    .filter(|p| pattern.is_match(p))
                    .filter_map(|p| t.get(&p).cloned().map(|v| (p, v)))
                    .collect()
            };
            let expected = diff_ops(&matching(&old), &matching(&new));

            store.replace_snapshot(new.clone());
            prop_assert_eq!(drain(&rx, expected.len()), expected);

            let tracked: BTreeSet<String> = store
                .match_watch(pattern.as_str())
                .unwrap()
                .tracked_paths()
                .into_iter()
                .collect();
            let wanted: BTreeSet<String> = matching(&new).into_keys().collect();
            prop_assert_eq!(tracked, wanted);
        }
    }
}
