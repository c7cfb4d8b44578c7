//! Per-node concurrent neighbour set with atomic snapshot replacement.
//!
//! Writers never mutate a published array: every mutation clones the current
//! snapshot, rebuilds it, and publishes the replacement with a single
//! compare-and-swap. Readers pin a snapshot and iterate it without locks; the
//! swapped-out array is freed once its last reader drops it.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::trace;

use crate::{
    array::{ConcurrentNeighbourArray, NeighbourArray},
    diversity::retain_diverse,
    error::{NeighbourError, Result},
    invariants::SetInvariantChecker,
    memory,
    similarity::{NodeId, SimilarityOracle, validate_score},
};

/// The edges of one graph node: a bounded, descending-sorted, deduplicated
/// neighbour list published through an atomic reference.
///
/// The set enforces three disciplines on every published array: the degree
/// cap, owner exclusion, and (after bulk installs and cap-triggered pruning)
/// the diversity rule. Mutations are serialised per owner by a
/// compare-and-swap retry loop and never block readers.
pub struct ConcurrentNeighbourSet<O> {
    owner: NodeId,
    max_degree: usize,
    oracle: Arc<O>,
    current: ArcSwap<ConcurrentNeighbourArray>,
}

impl<O: SimilarityOracle> ConcurrentNeighbourSet<O> {
    /// Creates an empty set for `owner` capped at `max_degree` neighbours.
    #[must_use]
    pub fn new(owner: NodeId, max_degree: usize, oracle: Arc<O>) -> Self {
        Self {
            owner,
            max_degree,
            oracle,
            // one slot of headroom: inserts overflow before pruning back down
            current: ArcSwap::from_pointee(ConcurrentNeighbourArray::with_capacity(
                max_degree + 1,
            )),
        }
    }

    /// Returns the owning node's id.
    #[must_use]
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Returns the degree cap.
    #[must_use]
    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    /// Returns the number of neighbours in the current snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    /// Returns whether the current snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Returns whether `node` is in the current snapshot. Linear scan.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.current.load().contains(node)
    }

    /// Returns the current snapshot.
    ///
    /// The snapshot is immutable; later mutations publish fresh arrays and
    /// never touch one a caller already holds. Intended for tests and
    /// reporting.
    #[must_use]
    pub fn current(&self) -> Arc<ConcurrentNeighbourArray> {
        self.current.load_full()
    }

    /// Iterates node ids in descending-score order over an owned snapshot.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use engawa_core::{ConcurrentNeighbourSet, NodeId, SimilarityOracle};
    ///
    /// struct Line;
    /// impl SimilarityOracle for Line {
    ///     fn score(&self, source: NodeId, target: NodeId) -> f32 {
    ///         -(source.abs_diff(target) as f32)
    ///     }
    /// }
    ///
    /// let set = ConcurrentNeighbourSet::new(0, 4, Arc::new(Line));
    /// set.insert(1, -1.0)?;
    /// set.insert(9, -9.0)?;
    /// let ids: Vec<_> = set.iter().collect();
    /// assert_eq!(ids, vec![1, 9]);
    /// # Ok::<(), engawa_core::NeighbourError>(())
    /// ```
    #[must_use]
    pub fn iter(&self) -> NeighbourIter {
        NeighbourIter {
            snapshot: self.current(),
            index: 0,
        }
    }

    /// Returns a checker for the structural invariants of the current
    /// snapshot.
    #[must_use]
    pub fn invariants(&self) -> SetInvariantChecker<'_, O> {
        SetInvariantChecker::new(self)
    }

    /// Inserts a single neighbour under the degree cap.
    ///
    /// When the insertion pushes the set past the cap, one diversity pass
    /// evicts *every* non-diverse neighbour, which can leave the set well
    /// below the cap; diversity is re-established rather than the worst entry
    /// dropped. Re-inserting a present neighbour is a no-op.
    ///
    /// # Errors
    /// Returns [`NeighbourError::OwnerAsNeighbour`] when `node` is the owner
    /// and [`NeighbourError::NonFiniteScore`] when `score` is not finite.
    pub fn insert(&self, node: NodeId, score: f32) -> Result<()> {
        self.reject_owner(node)?;
        let score = validate_score(self.owner, node, score)?;
        let mut snapshot = self.current.load();
        let mut retries = 0_u32;
        loop {
            let Some(next) = self.rebuild_with(&snapshot, node, score)? else {
                return Ok(());
            };
            let previous = self.current.compare_and_swap(&*snapshot, Arc::new(next));
            if Arc::ptr_eq(&*previous, &*snapshot) {
                return Ok(());
            }
            retries += 1;
            trace!(
                owner = self.owner,
                node, retries, "neighbour insert lost the swap; retrying"
            );
            snapshot = previous;
        }
    }

    /// Installs the diverse subset of a candidate list.
    ///
    /// `natural` is the candidate list a graph search produced for this
    /// owner; `concurrent` holds backlink proposals accumulated from other
    /// threads. The two are merged, merged again onto the current snapshot
    /// (current entries on the left, so existing neighbours win ties and the
    /// operation is idempotent), pruned for diversity, and published with a
    /// compare-and-swap that retries under contention.
    ///
    /// # Errors
    /// Returns [`NeighbourError::OwnerAsNeighbour`] when either list contains
    /// the owner and [`NeighbourError::NonFiniteScore`] when any consumed
    /// score is not finite.
    pub fn insert_diverse(
        &self,
        natural: &NeighbourArray,
        concurrent: &NeighbourArray,
    ) -> Result<()> {
        if natural.contains(self.owner) || concurrent.contains(self.owner) {
            return Err(NeighbourError::OwnerAsNeighbour { owner: self.owner });
        }
        let proposals = NeighbourArray::merge(natural, concurrent)?;
        let mut snapshot = self.current.load();
        loop {
            let combined = NeighbourArray::merge(snapshot.as_array(), &proposals)?;
            let next = retain_diverse(self.owner, self.max_degree, self.oracle.as_ref(), &combined)?;
            let previous = self.current.compare_and_swap(&*snapshot, Arc::new(next));
            if Arc::ptr_eq(&*previous, &*snapshot) {
                return Ok(());
            }
            trace!(owner = self.owner, "diverse install lost the swap; retrying");
            snapshot = previous;
        }
    }

    /// Adds the reciprocal edge on `other` after this owner selected it as a
    /// neighbour.
    ///
    /// # Errors
    /// Propagates the errors of [`ConcurrentNeighbourSet::insert`] on the
    /// other set.
    pub fn backlink(&self, other: &ConcurrentNeighbourSet<O>, score: f32) -> Result<()> {
        other.insert(self.owner, score)
    }

    /// Returns the byte footprint of the set, inclusive of its current array.
    #[must_use]
    pub fn ram_bytes_used(&self) -> u64 {
        memory::neighbour_set_bytes(self.current.load().capacity())
    }

    pub(crate) fn oracle(&self) -> &O {
        self.oracle.as_ref()
    }

    fn reject_owner(&self, node: NodeId) -> Result<()> {
        if node == self.owner {
            return Err(NeighbourError::OwnerAsNeighbour { owner: self.owner });
        }
        Ok(())
    }

    /// Clone-and-insert; prunes every non-diverse neighbour when the cap
    /// trips. Returns `None` for a duplicate, which needs no publish.
    fn rebuild_with(
        &self,
        current: &ConcurrentNeighbourArray,
        node: NodeId,
        score: f32,
    ) -> Result<Option<ConcurrentNeighbourArray>> {
        let mut next = current.clone();
        if !next.insert_sorted(node, score)? {
            return Ok(None);
        }
        if next.len() > self.max_degree {
            next = retain_diverse(
                self.owner,
                self.max_degree,
                self.oracle.as_ref(),
                next.as_array(),
            )?;
        }
        Ok(Some(next))
    }
}

/// Iterator over the node ids of one pinned snapshot, in descending-score
/// order.
pub struct NeighbourIter {
    snapshot: Arc<ConcurrentNeighbourArray>,
    index: usize,
}

impl Iterator for NeighbourIter {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.snapshot.nodes().get(self.index).copied()?;
        self.index += 1;
        Some(node)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.snapshot.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for NeighbourIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use engawa_test_support::oracle::{LineOracle, RingOracle};

    fn ring_candidates(
        oracle: &RingOracle,
        owner: NodeId,
        nodes: impl IntoIterator<Item = NodeId>,
    ) -> NeighbourArray {
        let mut candidates = NeighbourArray::new();
        for node in nodes {
            candidates
                .insert_sorted(node, oracle.score(owner, node))
                .expect("candidate insert");
        }
        candidates
    }

    #[test]
    fn overflowing_the_cap_evicts_every_non_diverse_neighbour() {
        let oracle = Arc::new(LineOracle);
        let set = ConcurrentNeighbourSet::new(0, 2, Arc::clone(&oracle));
        set.insert(1, oracle.score(0, 1)).expect("insert 1");
        set.insert(2, oracle.score(0, 2)).expect("insert 2");
        assert_eq!(set.len(), 2);

        set.insert(3, oracle.score(0, 3)).expect("insert 3");
        // the eviction pass removes 2 and 3, both dominated by 1
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next(), Some(1));
        set.invariants().check_all().expect("invariants after eviction");
    }

    #[test]
    fn insert_diverse_on_a_ring_keeps_the_adjacent_nodes() {
        let oracle = Arc::new(RingOracle::new(10));
        let candidates = ring_candidates(&oracle, 7, (0..10).filter(|&n| n != 7));
        assert_eq!(candidates.len(), 9);

        let set = ConcurrentNeighbourSet::new(7, 3, Arc::clone(&oracle));
        set.insert_diverse(&candidates, &NeighbourArray::new())
            .expect("bulk insert");
        assert_eq!(set.len(), 2);
        assert!(set.contains(6));
        assert!(set.contains(8));
        set.invariants().check_all().expect("invariants after bulk insert");
    }

    #[test]
    fn insert_diverse_with_a_split_candidate_list_matches_the_combined_one() {
        let oracle = Arc::new(RingOracle::new(10));
        let natural = ring_candidates(&oracle, 7, 0..7);
        let concurrent = ring_candidates(&oracle, 7, 8..10);

        let set = ConcurrentNeighbourSet::new(7, 3, Arc::clone(&oracle));
        set.insert_diverse(&natural, &concurrent).expect("bulk insert");
        assert_eq!(set.len(), 2);
        assert!(set.contains(6));
        assert!(set.contains(8));
        set.invariants().check_all().expect("invariants after bulk insert");
    }

    #[test]
    fn insert_diverse_preserves_an_early_backlink() {
        let oracle = Arc::new(RingOracle::new(10));
        let set = ConcurrentNeighbourSet::new(7, 3, Arc::clone(&oracle));
        // a backlink from 6 lands before the owner's own bulk install
        set.insert(6, oracle.score(7, 6)).expect("backlink insert");

        let candidates = ring_candidates(&oracle, 7, (0..10).filter(|&n| n != 7));
        set.insert_diverse(&candidates, &NeighbourArray::new())
            .expect("bulk insert");
        assert!(set.contains(6));
        assert!(set.contains(8));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn insert_diverse_is_idempotent() {
        let oracle = Arc::new(RingOracle::new(10));
        let candidates = ring_candidates(&oracle, 7, (0..10).filter(|&n| n != 7));
        let set = ConcurrentNeighbourSet::new(7, 3, Arc::clone(&oracle));
        set.insert_diverse(&candidates, &NeighbourArray::new())
            .expect("first install");
        let first = set.current();
        set.insert_diverse(&candidates, &NeighbourArray::new())
            .expect("second install");
        let second = set.current();
        assert_eq!(first.nodes(), second.nodes());
        assert_eq!(first.scores(), second.scores());
    }

    #[test]
    fn insert_diverse_re_prunes_existing_neighbours() {
        let oracle = Arc::new(LineOracle);
        let set = ConcurrentNeighbourSet::new(0, 3, Arc::clone(&oracle));
        set.insert(9, oracle.score(0, 9)).expect("insert 9");

        let mut natural = NeighbourArray::new();
        natural
            .insert_sorted(1, oracle.score(0, 1))
            .expect("candidate insert");
        set.insert_diverse(&natural, &NeighbourArray::new())
            .expect("bulk insert");
        // 9 is dominated by the freshly added 1 and is evicted
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn the_owner_is_rejected_everywhere() {
        let oracle = Arc::new(LineOracle);
        let set = ConcurrentNeighbourSet::new(5, 4, Arc::clone(&oracle));
        let err = set.insert(5, 0.0).expect_err("owner insert must fail");
        assert_eq!(err, NeighbourError::OwnerAsNeighbour { owner: 5 });

        let mut tainted = NeighbourArray::new();
        tainted.insert_sorted(5, 0.0).expect("insert");
        let err = set
            .insert_diverse(&tainted, &NeighbourArray::new())
            .expect_err("owner in natural must fail");
        assert_eq!(err, NeighbourError::OwnerAsNeighbour { owner: 5 });
        let err = set
            .insert_diverse(&NeighbourArray::new(), &tainted)
            .expect_err("owner in concurrent must fail");
        assert_eq!(err, NeighbourError::OwnerAsNeighbour { owner: 5 });
        assert!(set.is_empty());
    }

    #[test]
    fn non_finite_scores_are_rejected() {
        let oracle = Arc::new(LineOracle);
        let set = ConcurrentNeighbourSet::new(0, 4, oracle);
        let err = set.insert(1, f32::NAN).expect_err("NaN must fail");
        assert_eq!(err, NeighbourError::NonFiniteScore { left: 0, right: 1 });
        assert!(set.is_empty());
    }

    #[test]
    fn duplicate_inserts_publish_nothing() {
        let oracle = Arc::new(LineOracle);
        let set = ConcurrentNeighbourSet::new(0, 4, Arc::clone(&oracle));
        set.insert(1, oracle.score(0, 1)).expect("insert");
        let before = set.current();
        set.insert(1, oracle.score(0, 1)).expect("duplicate insert");
        let after = set.current();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn iterators_see_a_stable_snapshot() {
        let oracle = Arc::new(LineOracle);
        let set = ConcurrentNeighbourSet::new(0, 8, Arc::clone(&oracle));
        set.insert(1, oracle.score(0, 1)).expect("insert");
        let mut iter = set.iter();
        assert_eq!(iter.len(), 1);

        // published after the snapshot was pinned; the iterator is unaffected
        set.insert(2, oracle.score(0, 2)).expect("insert");
        assert_eq!(iter.next(), Some(1));
        assert_eq!(iter.next(), None);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn backlink_adds_the_reciprocal_edge() {
        let oracle = Arc::new(LineOracle);
        let left = ConcurrentNeighbourSet::new(3, 4, Arc::clone(&oracle));
        let right = ConcurrentNeighbourSet::new(4, 4, Arc::clone(&oracle));
        left.backlink(&right, oracle.score(4, 3)).expect("backlink");
        assert!(right.contains(3));
        assert!(left.is_empty());
    }

    #[test]
    fn ram_accounting_tracks_the_current_array() {
        let oracle = Arc::new(LineOracle);
        let set = ConcurrentNeighbourSet::new(0, 4, oracle);
        let empty = set.ram_bytes_used();
        assert!(empty > 0);
        assert_eq!(
            empty,
            crate::memory::neighbour_set_bytes(set.current().capacity()),
        );
    }
}
