#![no_main]

use arbitrary::Arbitrary;
use confwatch::{ConfigTree, Layers};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    base: Vec<(String, u8)>,
    overlay: Vec<(String, Option<bool>)>,
    prefix: String,
}

/// Keys that can be addressed with a dot path.
fn addressable(key: &str) -> bool {
    !key.is_empty() && !key.contains('.')
}

fn tree_of(pairs: impl IntoIterator<Item = (String, serde_json::Value)>) -> ConfigTree {
    let map: serde_json::Map<String, serde_json::Value> = pairs
        .into_iter()
        .filter(|(k, _)| addressable(k))
        .collect();
    ConfigTree::try_from(serde_json::Value::Object(map)).unwrap_or_default()
}

fuzz_target!(|input: Input| {
    if !input.prefix.split('.').all(addressable) {
        return;
    }

    let base = tree_of(input.base.into_iter().map(|(k, v)| (k, v.into())));
    let overlay = tree_of(
        input
            .overlay
            .into_iter()
            .map(|(k, v)| (k, v.map_or(serde_json::Value::Null, Into::into))),
    );

    let merged = Layers::new()
        .layer(base.clone())
        .prefixed(&input.prefix, overlay)
        .merge();

    // Every flattened path resolves
    for path in merged.flattened_paths() {
        assert!(merged.contains(&path), "unresolvable path {path:?}");
    }

    // Digests are deterministic
    assert_eq!(base.digest().ok(), base.clone().digest().ok());
});
