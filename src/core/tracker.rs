//! Inflight dependency tracking, ported from `InflightTracker` in the
//! reference implementation's `mosh/inflight.py`.
//!
//! `inflight_deps` is a sorted multiset (duplicates preserved) of the
//! reference states that currently-inflight instructions depend on, backed
//! by a plain sorted `Vec` the way `sortedcontainers.SortedList` is used in
//! the original — Rust's standard collections don't have a built-in
//! duplicate-keeping sorted multiset, and a `Vec` kept sorted via binary
//! search is the direct, dependency-free translation.

use std::collections::{BTreeSet, HashMap};

/// Tracks which locally produced states are still unacknowledged, and what
/// each one's diff was computed against.
#[derive(Debug, Default)]
pub struct InflightTracker {
    /// State numbers sent but not yet acknowledged.
    inflight_states: BTreeSet<u64>,
    /// For each inflight (or historically inflight) state number, the old
    /// state number its diff depended on.
    dep: HashMap<u64, Option<u64>>,
    /// Sorted multiset of dependencies of currently-inflight states.
    inflight_deps: Vec<u64>,
    /// Highest state number acknowledged so far.
    highest_ack: u64,
}

impl InflightTracker {
    /// Create an empty tracker. `highest_ack` starts at 0, matching the
    /// implicit initial state both endpoints already share.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest state number acknowledged so far.
    pub fn highest_ack(&self) -> u64 {
        self.highest_ack
    }

    /// Record that `new_num` was just sent, depending on `depends_on`.
    pub fn sent(&mut self, new_num: u64, depends_on: Option<u64>) {
        self.inflight_states.insert(new_num);
        self.dep.insert(new_num, depends_on);
        if let Some(d) = depends_on {
            insert_sorted(&mut self.inflight_deps, d);
        }
    }

    /// Record an acknowledgment of everything up to and including
    /// `state_number`.
    pub fn acked(&mut self, state_number: u64) {
        if state_number > self.highest_ack {
            self.highest_ack = state_number;
        }
        let acked: Vec<u64> = self
            .inflight_states
            .range(..=state_number)
            .copied()
            .collect();
        for k in acked {
            self.inflight_states.remove(&k);
            if let Some(depends_on) = self.dep.remove(&k).flatten() {
                remove_one(&mut self.inflight_deps, depends_on);
            }
        }
    }

    /// The smallest dependency among currently-inflight states, if any are
    /// still outstanding.
    pub fn min_inflight_dependency(&self) -> Option<u64> {
        self.inflight_deps.first().copied()
    }

    /// Number of states currently inflight (unacknowledged).
    pub fn inflight_count(&self) -> usize {
        self.inflight_states.len()
    }
}

fn insert_sorted(v: &mut Vec<u64>, value: u64) {
    let idx = v.partition_point(|&x| x < value);
    v.insert(idx, value);
}

fn remove_one(v: &mut Vec<u64>, value: u64) {
    if let Ok(idx) = v.binary_search(&value) {
        v.remove(idx);
    }
}
