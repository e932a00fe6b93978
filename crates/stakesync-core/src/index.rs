//! Stream index — the single derived view of which streams the operator
//! currently has stake exposure to.
//!
//! Owns two maps: `sponsorship → stream` (the stake edges) and
//! `stream → refcount` (how many live edges point at each stream). All
//! mutation goes through [`StreamIndex::apply_stake`] and
//! [`StreamIndex::apply_unstake`]; both are idempotent, which is what lets
//! the backfill pager and the live event feed race without coordination.

use std::collections::{BTreeSet, HashMap};

use crate::types::{SponsorshipAddress, StreamId};

/// An externally visible change to the staked stream set.
///
/// Only genuine 0↔1 refcount crossings produce a transition; an edge that
/// merely changes a refcount from N to N±1 (N ≥ 1) is invisible downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The stream gained its first stake edge (refcount 0 → 1).
    Added(StreamId),
    /// The stream lost its last stake edge (refcount 1 → 0).
    Removed(StreamId),
}

/// Reference-counted index of the operator's stake edges.
///
/// Invariant: the visible stream set is exactly
/// `{stream : refcount(stream) > 0}`, and
/// `refcount(stream) == |{s : edge(s) == stream}|` at all times.
#[derive(Debug, Default)]
pub struct StreamIndex {
    /// Live stake edges, at most one per sponsorship.
    edges: HashMap<SponsorshipAddress, StreamId>,
    /// Number of live edges pointing at each stream. Entries are removed
    /// (never left at zero) when the last edge goes away.
    refcounts: HashMap<StreamId, u32>,
}

impl StreamIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stake edge from `sponsorship` to `stream`.
    ///
    /// Idempotent: re-applying a known edge is a no-op. Returns
    /// `Some(Transition::Added)` only when the stream's refcount crossed
    /// 0 → 1, i.e. this is the first sponsorship staking into that stream.
    pub fn apply_stake(
        &mut self,
        sponsorship: SponsorshipAddress,
        stream: StreamId,
    ) -> Option<Transition> {
        if let Some(existing) = self.edges.get(&sponsorship) {
            if *existing == stream {
                // Duplicate delivery (backfill/live race or reconnect replay).
                return None;
            }
            // A sponsorship is pinned to one stream for its lifetime; a
            // conflicting observation is a collaborator inconsistency the
            // caller resolves via unstake-then-stake.
            tracing::warn!(
                sponsorship = %sponsorship,
                known = %existing,
                observed = %stream,
                "Stake for already-staked sponsorship names a different stream"
            );
            return None;
        }

        self.edges.insert(sponsorship, stream.clone());
        let count = self.refcounts.entry(stream.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            Some(Transition::Added(stream))
        } else {
            None
        }
    }

    /// Remove the stake edge for `sponsorship`, if one is known.
    ///
    /// An unknown sponsorship is a no-op: either a duplicate delivery or an
    /// `Unstaked` that raced ahead of its `Staked` during startup. Returns
    /// `Some(Transition::Removed)` only when the stream's refcount crossed
    /// 1 → 0.
    pub fn apply_unstake(&mut self, sponsorship: &SponsorshipAddress) -> Option<Transition> {
        let stream = self.edges.remove(sponsorship)?;
        match self.refcounts.get_mut(&stream) {
            Some(count) if *count > 1 => {
                *count -= 1;
                None
            }
            Some(_) => {
                self.refcounts.remove(&stream);
                Some(Transition::Removed(stream))
            }
            // Unreachable while the refcount invariant holds; tolerate it
            // rather than poisoning the engine.
            None => None,
        }
    }

    /// Point-in-time snapshot of the actively staked stream set.
    pub fn current_streams(&self) -> BTreeSet<StreamId> {
        self.refcounts.keys().cloned().collect()
    }

    /// The stream a sponsorship currently stakes into, if any.
    pub fn stream_of(&self, sponsorship: &SponsorshipAddress) -> Option<&StreamId> {
        self.edges.get(sponsorship)
    }

    /// Number of live edges pointing at `stream`.
    pub fn refcount(&self, stream: &StreamId) -> u32 {
        self.refcounts.get(stream).copied().unwrap_or(0)
    }

    /// Total number of live stake edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if no stake edges are known.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
