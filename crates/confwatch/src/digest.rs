//! Canonical content digests.
//!
//! Structured values are compared by digest instead of by deep traversal.
//! The canonical form is the compact JSON serialization of a tagged mirror
//! of the value: every node is written as its variant (`"Null"`,
//! `{"Integer":1}`, `{"Map":{..}}`), and floats are written as their IEEE-754
//! bit pattern. Maps are `BTreeMap`s, so keys are always emitted in sorted
//! order and two subtrees with the same content produce the same bytes no
//! matter how they were built. The bytes are streamed straight into SHA-256.
//!
//! Two values have equal digests exactly when they are equal under
//! [`Value`]'s `PartialEq`, including `NaN`, infinities and signed zeros.

use std::fmt;

use serde::ser::{Serialize, Serializer};
use sha2::{Digest as _, Sha256};

use crate::error::Error;
use crate::value::Value;

/// SHA-256 digest of a value's canonical serialization.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Computes the digest of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Canonicalize`] if the value cannot be serialized.
    pub fn of(value: &Value) -> Result<Self, Error> {
        let mut hasher = Sha256::new();
        serde_json::to_writer(&mut hasher, &Canonical(value))
            .map_err(|source| Error::Canonicalize { source })?;
        Ok(Self(hasher.finalize().into()))
    }

    /// Digest of a list of strings joined with `@`.
    ///
    /// Used to detect whether a tree's key topology changed.
    pub(crate) fn of_paths(paths: &[String]) -> Self {
        let mut hasher = Sha256::new();
        for (i, path) in paths.iter().enumerate() {
            if i > 0 {
                hasher.update(b"@");
            }
            hasher.update(path.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    /// The raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Tagged view of a [`Value`] used only for hashing.
///
/// Plain JSON writes non-finite floats as `null`; tagging every node and
/// hashing floats by bit pattern keeps the encoding injective.
struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        const NAME: &str = "Value";

        match self.0 {
            Value::Null => serializer.serialize_unit_variant(NAME, 0, "Null"),

            Value::Boolean(b) => serializer.serialize_newtype_variant(NAME, 1, "Boolean", b),

            Value::Integer(n) => serializer.serialize_newtype_variant(NAME, 2, "Integer", n),

            Value::UnsignedInteger(n) => {
                serializer.serialize_newtype_variant(NAME, 3, "UnsignedInteger", n)
            }

            Value::Float(f) => {
                serializer.serialize_newtype_variant(NAME, 4, "Float", &f.to_bits())
            }

            Value::String(s) => serializer.serialize_newtype_variant(NAME, 5, "String", s),

            Value::List(items) => serializer.serialize_newtype_variant(
                NAME,
                6,
                "List",
                &CanonicalList(items),
            ),

            Value::Map(map) => {
                serializer.serialize_newtype_variant(NAME, 7, "Map", &CanonicalMap(map))
            }
        }
    }
}

struct CanonicalList<'a>(&'a [Value]);

impl Serialize for CanonicalList<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(Canonical))
    }
}

struct CanonicalMap<'a>(&'a std::collections::BTreeMap<String, Value>);

impl Serialize for CanonicalMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, Canonical(v))))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}
