//! Pattern watch over the whole flattened path set.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use regex::Regex;

use super::item::{ItemPool, WatchItem};
use super::{
    Callbacks, Entry, EventCallback, Watch, WatchContext, diff_entries, dispatch_events,
    rebuild_entries,
};
use crate::digest::Digest;
use crate::error::Error;
use crate::tree::ConfigTree;

/// Watches every flattened path that matches a regular expression.
///
/// The set of matching paths is recomputed on every check, so paths that
/// appear, disappear or change value are reported as `Add`, `Delete` and
/// `Update` events. Events carry the matched path in both `full_path` and
/// `sub_key`.
///
/// This is the most expensive watch: each check flattens the whole tree.
/// The filtered path list is cached per key topology, so an unchanged set
/// of paths skips the regex pass; tracked values are still re-checked.
pub struct MatchKeyWatch {
    pattern: Regex,
    state: Mutex<MatchState>,
    callbacks: Callbacks<EventCallback>,
}

#[derive(Default)]
struct MatchState {
    /// Matched path → baseline.
    tracked: BTreeMap<String, WatchItem>,

    /// Digest of the flattened path list the cached matches came from.
    topology: Option<Digest>,

    /// Paths matching the pattern under `topology`.
    matches: Vec<String>,
}

impl MatchState {
    /// Matching paths of `tree`, reusing the cache when the topology is unchanged.
    fn matching_paths(&mut self, pattern: &Regex, tree: &ConfigTree) -> &[String] {
        let paths = tree.flattened_paths();
        let topology = Digest::of_paths(&paths);
        if self.topology != Some(topology) {
            self.matches = paths.into_iter().filter(|p| pattern.is_match(p)).collect();
            self.topology = Some(topology);
        }
        &self.matches
    }
}

impl MatchKeyWatch {
    /// Creates the watch with `tree` as its baseline.
    pub(crate) fn new(
        pattern: Regex,
        tree: &ConfigTree,
        pool: &ItemPool,
        callback: EventCallback,
    ) -> Result<Self, Error> {
        let mut state = MatchState::default();
        let entries = to_entries(state.matching_paths(&pattern, tree));
        rebuild_entries(pool, &mut state.tracked, &entries, tree)?;

        Ok(Self {
            pattern,
            state: Mutex::new(state),
            callbacks: Callbacks::new(callback),
        })
    }

    /// The pattern source text.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Paths tracked as of the last reload.
    #[must_use]
    pub fn tracked_paths(&self) -> Vec<String> {
        self.state.lock().tracked.keys().cloned().collect()
    }

    pub(crate) fn add_callback(&self, callback: EventCallback) {
        self.callbacks.push(callback);
    }
}

fn to_entries(paths: &[String]) -> Vec<Entry> {
    paths.iter().map(|p| (p.clone(), p.clone())).collect()
}

impl Watch for MatchKeyWatch {
    fn target(&self) -> &str {
        self.pattern.as_str()
    }

    fn check_and_notify(&self, ctx: &WatchContext<'_>) -> Result<usize, Error> {
        let events = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let tree = ctx.current();

            let entries = to_entries(state.matching_paths(&self.pattern, &tree));
            let events = diff_entries(&state.tracked, &entries, &tree)?;
            if !events.is_empty() {
                rebuild_entries(ctx.pool, &mut state.tracked, &entries, &tree)?;
            }
            events
        };

        tracing::trace!(pattern = %self.pattern, events = events.len(), "match watch diffed");
        Ok(dispatch_events(
            ctx.dispatcher,
            &self.callbacks.snapshot(),
            &events,
        ))
    }
}

impl std::fmt::Debug for MatchKeyWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchKeyWatch")
            .field("pattern", &self.pattern.as_str())
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}
