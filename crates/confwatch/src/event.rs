//! Child- and path-level change events.

use std::fmt;

/// What happened to a child key or matched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EventOp {
    /// The key appeared.
    Add = 1,

    /// The key existed before and its value changed.
    Update = 2,

    /// The key disappeared.
    Delete = 3,
}

impl EventOp {
    /// Numeric operation code (`1` add, `2` update, `3` delete).
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for EventOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),

            Self::Update => f.write_str("update"),

            Self::Delete => f.write_str("delete"),
        }
    }
}

/// One child-level change reported by a map watch or a match watch.
///
/// For map watches `sub_key` is the child key below the watched path and
/// `full_path` is `<watched path>.<sub_key>`. For match watches both fields
/// hold the matched path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigUpdateEvent {
    /// Full dot-separated path of the changed node.
    pub full_path: String,

    /// Key relative to the watch.
    pub sub_key: String,

    /// What happened.
    pub op: EventOp,
}

impl ConfigUpdateEvent {
    /// Create a new event.
    pub fn new(full_path: impl Into<String>, sub_key: impl Into<String>, op: EventOp) -> Self {
        Self {
            full_path: full_path.into(),
            sub_key: sub_key.into(),
            op,
        }
    }
}

impl fmt::Display for ConfigUpdateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.full_path)
    }
}
