//! Tagged configuration values.
//!
//! The [`Value`] enum is the node type every snapshot is built from. It is a
//! closed set of variants, so the diff engine works by matching on the tag
//! instead of inspecting types at runtime:
//!
//! - scalars (`Null`, `Boolean`, `Integer`, `UnsignedInteger`, `Float`, `String`)
//! - structured values (`List`, `Map`)
//!
//! A missing key is not a variant. Lookups return `Option<&Value>` and
//! absence is `None`.
//!
//! # Example
//!
//! ```rust
//! use confwatch::Value;
//!
//! let value = Value::from(8080);
//! assert_eq!(value.to_u16(), Some(8080));
//! assert!(!value.is_structured());
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

use num_traits::ToPrimitive;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Serialize;

/// Key under which `toml` hands datetimes to foreign deserializers.
const TOML_DATETIME_KEY: &str = "$__toml_private_datetime";

// ============================================================================
// Macros for reducing boilerplate
// ============================================================================

/// Generates `From<T>` implementations for Value
macro_rules! impl_from_integer {
    ($($t:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::$variant(n as _)
                }
            }
        )+
    };
}

/// Generates `to_*` methods that use ToPrimitive
macro_rules! impl_to_primitive {
    ($($method:ident -> $t:ty),+ $(,)?) => {
        $(
            #[doc = concat!("Converts to `", stringify!($t), "` if possible.")]
            #[must_use]
            pub fn $method(&self) -> Option<$t> {
                match self {
                    Value::Integer(n) => n.$method(),

                    Value::UnsignedInteger(n) => n.$method(),

                    Value::Float(f) => f.$method(),

                    Value::String(s) => s.parse().ok(),

                    _ => None,
                }
            }
        )+
    };
}

// ============================================================================
// Value Enum
// ============================================================================

/// A node of a configuration snapshot.
///
/// # Supported Types
///
/// | Variant | Rust Types |
/// |---------|------------|
/// | `Null` | explicit null (JSON/YAML) |
/// | `Boolean` | `bool` |
/// | `Integer` | `i8` - `i64`, `isize` |
/// | `UnsignedInteger` | `u64` values above `i64::MAX` |
/// | `Float` | `f32`, `f64` |
/// | `String` | `String`, `&str` |
/// | `List` | `Vec<Value>` |
/// | `Map` | `BTreeMap<String, Value>` |
///
/// Maps keep their keys sorted, so two maps built in a different insertion
/// order serialize identically.
///
/// Equality is content identity: floats compare by bit pattern, so `NaN`
/// equals itself and `0.0` differs from `-0.0`. This matches
/// [`Digest`](crate::Digest), which makes `Value` a lawful `Eq`.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// An explicit null.
    Null,

    /// A boolean value.
    Boolean(bool),

    /// A signed integer (stored as i64).
    Integer(i64),

    /// An unsigned integer that does not fit in i64.
    UnsignedInteger(u64),

    /// A floating-point value (stored as f64).
    Float(f64),

    /// A string value.
    String(String),

    /// An ordered list of values, addressed by index.
    List(Vec<Value>),

    /// A map of string keys to values.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns an empty map.
    #[must_use]
    pub const fn empty_map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// Returns `true` for maps and lists.
    ///
    /// Structured values are compared by digest, scalars by value.
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        matches!(self, Value::Map(_) | Value::List(_))
    }

    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",

            Value::Boolean(_) => "boolean",

            Value::Integer(_) | Value::UnsignedInteger(_) => "integer",

            Value::Float(_) => "float",

            Value::String(_) => "string",

            Value::List(_) => "list",

            Value::Map(_) => "map",
        }
    }

    /// Returns the string slice if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),

            _ => None,
        }
    }

    /// Returns the boolean if this is a `Boolean`.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),

            _ => None,
        }
    }

    /// Returns the entries if this is a `Map`.
    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),

            _ => None,
        }
    }

    /// Returns the elements if this is a `List`.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),

            _ => None,
        }
    }

    impl_to_primitive! {
        to_i8 -> i8,
        to_i16 -> i16,
        to_i32 -> i32,
        to_i64 -> i64,
        to_u8 -> u8,
        to_u16 -> u16,
        to_u32 -> u32,
        to_u64 -> u64,
        to_usize -> usize,
        to_f64 -> f64,
    }

    /// Steps one path segment into this value.
    ///
    /// Maps are indexed by key, lists by a decimal index. Scalars have no
    /// children.
    #[must_use]
    pub fn child(&self, segment: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(segment),

            Value::List(l) => segment.parse::<usize>().ok().and_then(|i| l.get(i)),

            _ => None,
        }
    }

    /// Immediate child keys: map keys, or list indices as strings.
    ///
    /// Scalars yield an empty list.
    #[must_use]
    pub fn child_keys(&self) -> Vec<String> {
        match self {
            Value::Map(m) => m.keys().cloned().collect(),

            Value::List(l) => (0..l.len()).map(|i| i.to_string()).collect(),

            _ => Vec::new(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,

            (Value::Boolean(a), Value::Boolean(b)) => a == b,

            (Value::Integer(a), Value::Integer(b)) => a == b,

            (Value::UnsignedInteger(a), Value::UnsignedInteger(b)) => a == b,

            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),

            (Value::String(a), Value::String(b)) => a == b,

            (Value::List(a), Value::List(b)) => a == b,

            (Value::Map(a), Value::Map(b)) => a == b,

            _ => false,
        }
    }
}

impl Eq for Value {}

// ============================================================================
// Conversions
// ============================================================================

impl_from_integer! {
    i8 => Integer,
    i16 => Integer,
    i32 => Integer,
    i64 => Integer,
    isize => Integer,
    u8 => Integer,
    u16 => Integer,
    u32 => Integer,
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(Value::UnsignedInteger(n), Value::Integer)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,

            serde_json::Value::Bool(b) => Value::Boolean(b),

            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UnsignedInteger(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }

            serde_json::Value::String(s) => Value::String(s),

            serde_json::Value::Array(arr) => Value::List(arr.into_iter().map(Value::from).collect()),

            serde_json::Value::Object(obj) => {
                Value::Map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),

            Value::Boolean(b) => write!(f, "{b}"),

            Value::Integer(n) => write!(f, "{n}"),

            Value::UnsignedInteger(n) => write!(f, "{n}"),

            Value::Float(x) => write!(f, "{x}"),

            Value::String(s) => f.write_str(s),

            Value::List(_) | Value::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

// ============================================================================
// Deserialization
// ============================================================================

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a configuration value")
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Boolean(b))
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> Result<Value, E> {
        Ok(Value::Integer(n))
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<Value, E> {
        Ok(Value::from(n))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> Result<Value, E> {
        Ok(Value::Float(f))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
        Ok(Value::String(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Value, E> {
        Ok(Value::String(s))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A>(self, mut access: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut map = BTreeMap::new();
        while let Some(MapKey(key)) = access.next_key()? {
            // TOML datetimes arrive as a single-entry map; keep them as text
            if map.is_empty() && key == TOML_DATETIME_KEY {
                let datetime: String = access.next_value()?;
                return Ok(Value::String(datetime));
            }
            match map.entry(key) {
                Entry::Occupied(entry) => {
                    return Err(de::Error::custom(format_args!(
                        "duplicate map key `{}`",
                        entry.key()
                    )));
                }

                Entry::Vacant(entry) => {
                    entry.insert(access.next_value()?);
                }
            }
        }
        Ok(Value::Map(map))
    }
}

/// Map key that also accepts the scalar keys YAML allows.
///
/// Integer and boolean keys are stored in their decimal/`true`/`false` text
/// form. Float and null keys are rejected. Since `1` and `"1"` become the
/// same key, the map visitor refuses duplicates instead of letting the later
/// entry win.
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(MapKeyVisitor)
    }
}

struct MapKeyVisitor;

impl Visitor<'_> for MapKeyVisitor {
    type Value = MapKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, integer or boolean map key")
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<MapKey, E> {
        Ok(MapKey(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<MapKey, E> {
        Ok(MapKey(s))
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> Result<MapKey, E> {
        Ok(MapKey(n.to_string()))
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<MapKey, E> {
        Ok(MapKey(n.to_string()))
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<MapKey, E> {
        Ok(MapKey(b.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let value = Value::from(json!({"a": [1, "x", null, 1.5], "b": {"c": true}}));
        let map = value.as_map().unwrap();
        assert_eq!(
            map["a"],
            Value::List(vec![
                Value::Integer(1),
                Value::from("x"),
                Value::Null,
                Value::Float(1.5),
            ])
        );
        assert_eq!(map["b"].child("c"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn test_child_lookup() {
        let value = Value::from(json!({"list": [10, 20]}));
        let list = value.child("list").unwrap();
        assert_eq!(list.child("1"), Some(&Value::Integer(20)));
        assert_eq!(list.child("2"), None);
        assert_eq!(list.child("x"), None);
        assert_eq!(Value::Integer(3).child("0"), None);
    }

    #[test]
    fn test_child_keys() {
        let value = Value::from(json!({"m": {"b": 1, "a": 2}, "l": [1, 2, 3]}));
        assert_eq!(value.child("m").unwrap().child_keys(), vec!["a", "b"]);
        assert_eq!(value.child("l").unwrap().child_keys(), vec!["0", "1", "2"]);
        assert!(Value::from("scalar").child_keys().is_empty());
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(Value::from(300).to_u8(), None);
        assert_eq!(Value::from(300).to_u16(), Some(300));
        assert_eq!(Value::from("42").to_i32(), Some(42));
        assert_eq!(Value::from(u64::MAX), Value::UnsignedInteger(u64::MAX));
        assert_eq!(Value::from(7u64), Value::Integer(7));
        assert_eq!(Value::Boolean(true).to_i64(), None);
    }

    #[test]
    fn test_integer_and_float_are_distinct() {
        assert_ne!(Value::Integer(1), Value::Float(1.0));
    }

    #[test]
    fn test_deserialize_json() {
        let value: Value = serde_json::from_str(r#"{"a": {"b": [1, 2]}, "n": null}"#).unwrap();
        assert_eq!(value, Value::from(json!({"a": {"b": [1, 2]}, "n": null})));
    }

    #[test]
    fn test_serialize_sorted_keys() {
        let mut map = BTreeMap::new();
        map.insert("z".to_string(), Value::from(1));
        map.insert("a".to_string(), Value::from(2));
        let json = serde_json::to_string(&Value::Map(map)).unwrap();
        assert_eq!(json, r#"{"a":2,"z":1}"#);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("text").to_string(), "text");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::from(json!({"k": [1]})).to_string(), r#"{"k":[1]}"#);
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Float(f64::INFINITY), Value::Null);
        assert_ne!(Value::Integer(1), Value::Float(1.0));
        assert_eq!(
            Value::from(vec![f64::NAN, f64::INFINITY]),
            Value::from(vec![f64::NAN, f64::INFINITY])
        );
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let err = serde_json::from_str::<Value>(r#"{"a": 1, "a": 2}"#).unwrap_err();
        assert!(err.to_string().contains("duplicate map key `a`"));
    }
}
