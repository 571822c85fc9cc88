//! Per-path change tracking.
//!
//! A [`WatchItem`] remembers what one path looked like at the last reload and
//! answers "did it change?" against a newer snapshot. [`ItemPool`] recycles
//! items for watches that track many paths.

use parking_lot::Mutex;

use crate::digest::Digest;
use crate::error::Error;
use crate::tree::ConfigTree;
use crate::value::Value;

/// Default number of idle items a pool keeps.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Last observed state of a path.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) enum Baseline {
    /// Nothing at the path.
    #[default]
    Absent,

    /// A scalar, kept by value.
    Scalar(Value),

    /// A map or list, kept by digest only.
    Structured(Digest),
}

impl Baseline {
    /// Reads the current state of `path` in `tree`.
    pub(crate) fn observe(tree: &ConfigTree, path: &str) -> Result<Self, Error> {
        Ok(match tree.get(path) {
            None => Self::Absent,

            Some(value) if value.is_structured() => Self::Structured(Digest::of(value)?),

            Some(value) => Self::Scalar(value.clone()),
        })
    }

    /// Change policy between two observations of the same path.
    ///
    /// A flip between structured and scalar/absent always counts as a
    /// change; two structured values compare by digest; everything else
    /// compares by value (floats by bit pattern, like the digest), with
    /// absence equal only to absence.
    pub(crate) fn differs(&self, current: &Self) -> bool {
        match (self, current) {
            (Self::Structured(last), Self::Structured(now)) => last != now,

            (Self::Structured(_), _) | (_, Self::Structured(_)) => true,

            (Self::Scalar(last), Self::Scalar(now)) => last != now,

            (Self::Absent, Self::Absent) => false,

            (Self::Absent, Self::Scalar(_)) | (Self::Scalar(_), Self::Absent) => true,
        }
    }
}

/// Last known state of one path.
#[derive(Debug, Default)]
pub(crate) struct WatchItem {
    path: String,
    baseline: Baseline,
}

impl WatchItem {
    /// Creates an item for `path` with an absent baseline.
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baseline: Baseline::Absent,
        }
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// Captures the current state of the path as the new baseline.
    pub(crate) fn reload(&mut self, tree: &ConfigTree) -> Result<(), Error> {
        self.baseline = self.observe(tree)?;
        Ok(())
    }

    /// Whether the path changed in `tree` relative to the baseline.
    pub(crate) fn is_changed(&self, tree: &ConfigTree) -> Result<bool, Error> {
        let current = self.observe(tree)?;
        Ok(self.differs_from(&current))
    }

    /// Reads the state of the path in `tree` without touching the baseline.
    pub(crate) fn observe(&self, tree: &ConfigTree) -> Result<Baseline, Error> {
        Baseline::observe(tree, &self.path)
    }

    pub(crate) fn differs_from(&self, current: &Baseline) -> bool {
        self.baseline.differs(current)
    }

    /// Installs an observation taken with [`observe`](Self::observe).
    pub(crate) fn accept(&mut self, current: Baseline) {
        self.baseline = current;
    }

    /// Clears all state so the item can be reused for another path.
    fn reset(&mut self) {
        self.path.clear();
        self.baseline = Baseline::Absent;
    }
}

/// Bounded free-list of [`WatchItem`]s.
///
/// Items are only taken and returned by a watch that holds its own lock, so
/// a returned item is never observed by two watches at once.
#[derive(Debug)]
pub(crate) struct ItemPool {
    free: Mutex<Vec<WatchItem>>,
    capacity: usize,
}

impl ItemPool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Takes an item for `path`, reusing an idle one when available.
    pub(crate) fn acquire(&self, path: &str) -> WatchItem {
        match self.free.lock().pop() {
            Some(mut item) => {
                item.path.push_str(path);
                item
            }

            None => WatchItem::new(path),
        }
    }

    /// Returns an item to the pool, dropping it when the pool is full.
    pub(crate) fn release(&self, mut item: WatchItem) {
        item.reset();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(item);
        }
    }

    /// Returns every item yielded by `items`.
    pub(crate) fn release_all(&self, items: impl IntoIterator<Item = WatchItem>) {
        for item in items {
            self.release(item);
        }
    }

    #[cfg(test)]
    pub(crate) fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl Default for ItemPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}
