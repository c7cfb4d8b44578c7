//! Descending-sorted neighbour storage.
//!
//! [`NeighbourArray`] keeps parallel node/score arrays ordered by descending
//! score and provides the primitive ordered insert and merge operations the
//! rest of the crate is built on. [`ConcurrentNeighbourArray`] layers
//! duplicate-id rejection on top; it is the only representation a
//! [`ConcurrentNeighbourSet`](crate::ConcurrentNeighbourSet) ever publishes.

use std::{collections::HashSet, ops::Deref};

use crate::{
    error::{NeighbourError, Result},
    similarity::NodeId,
};

/// A bounded, growable sequence of `(node, score)` pairs sorted by descending
/// score.
///
/// Duplicate node ids are permitted here; callers that need uniqueness use
/// [`ConcurrentNeighbourArray`]. Growth is amortised doubling via the backing
/// vectors; an allocation failure surfaces as
/// [`NeighbourError::CapacityExceeded`] instead of aborting.
///
/// # Examples
/// ```
/// use engawa_core::NeighbourArray;
///
/// let mut array = NeighbourArray::new();
/// array.insert_sorted(4, 0.25)?;
/// array.insert_sorted(9, 0.75)?;
/// assert_eq!(array.nodes(), [9, 4]);
/// assert_eq!(array.scores(), [0.75, 0.25]);
/// # Ok::<(), engawa_core::NeighbourError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NeighbourArray {
    nodes: Vec<NodeId>,
    scores: Vec<f32>,
}

impl NeighbourArray {
    /// Creates an empty array.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty array with room for `capacity` pairs.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            scores: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of stored pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the array holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the allocated capacity of the backing storage.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    /// Returns the node ids in descending-score order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Returns the scores in descending order.
    #[must_use]
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// Returns the node id at `index`.
    ///
    /// # Errors
    /// Returns [`NeighbourError::IndexOutOfBounds`] when `index >= len()`.
    pub fn node_at(&self, index: usize) -> Result<NodeId> {
        self.nodes
            .get(index)
            .copied()
            .ok_or(NeighbourError::IndexOutOfBounds {
                index,
                len: self.len(),
            })
    }

    /// Returns the score at `index`.
    ///
    /// # Errors
    /// Returns [`NeighbourError::IndexOutOfBounds`] when `index >= len()`.
    pub fn score_at(&self, index: usize) -> Result<f32> {
        self.scores
            .get(index)
            .copied()
            .ok_or(NeighbourError::IndexOutOfBounds {
                index,
                len: self.len(),
            })
    }

    /// Returns whether `node` is present. Linear scan.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Iterates over `(node, score)` pairs in descending-score order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, f32)> + '_ {
        self.nodes
            .iter()
            .copied()
            .zip(self.scores.iter().copied())
    }

    /// Appends a pair that is already known to sort last.
    ///
    /// # Errors
    /// Returns [`NeighbourError::DescendingOrderViolation`] when `score`
    /// exceeds the current lowest score, and
    /// [`NeighbourError::CapacityExceeded`] when the array cannot grow.
    pub fn push_descending(&mut self, node: NodeId, score: f32) -> Result<()> {
        if let Some(&floor) = self.scores.last() {
            if score > floor {
                return Err(NeighbourError::DescendingOrderViolation { score, floor });
            }
        }
        self.grow_for(1)?;
        self.nodes.push(node);
        self.scores.push(score);
        Ok(())
    }

    /// Inserts a pair at its descending-sorted position and returns the index
    /// it landed at.
    ///
    /// Within a run of equal scores the new pair lands at the end of the run,
    /// so existing entries keep their relative order.
    ///
    /// # Errors
    /// Returns [`NeighbourError::CapacityExceeded`] when the array cannot
    /// grow.
    pub fn insert_sorted(&mut self, node: NodeId, score: f32) -> Result<usize> {
        self.grow_for(1)?;
        let index = self.descending_insertion_point(score);
        self.nodes.insert(index, node);
        self.scores.insert(index, score);
        Ok(index)
    }

    /// Removes the pair at `index`, shifting the tail left.
    ///
    /// # Errors
    /// Returns [`NeighbourError::IndexOutOfBounds`] when `index >= len()`.
    pub fn remove_at(&mut self, index: usize) -> Result<()> {
        if index >= self.len() {
            return Err(NeighbourError::IndexOutOfBounds {
                index,
                len: self.len(),
            });
        }
        self.nodes.remove(index);
        self.scores.remove(index);
        Ok(())
    }

    /// Deduplicating merge of two descending-sorted arrays.
    ///
    /// Every node id present in either input appears exactly once in the
    /// output. When both inputs carry the same id, the left entry wins along
    /// with its score: existing neighbours take precedence over new
    /// proposals. Runs in `O(|left| + |right|)` time and transient memory.
    ///
    /// # Errors
    /// Returns [`NeighbourError::CapacityExceeded`] when the output cannot be
    /// allocated.
    ///
    /// # Examples
    /// ```
    /// use engawa_core::NeighbourArray;
    ///
    /// let mut left = NeighbourArray::new();
    /// left.push_descending(3, 3.0)?;
    /// left.push_descending(2, 2.0)?;
    ///
    /// let mut right = NeighbourArray::new();
    /// right.push_descending(2, 2.0)?;
    ///
    /// let merged = NeighbourArray::merge(&left, &right)?;
    /// assert_eq!(merged.nodes(), [3, 2]);
    /// # Ok::<(), engawa_core::NeighbourError>(())
    /// ```
    pub fn merge(left: &Self, right: &Self) -> Result<Self> {
        let mut merged = Self::new();
        merged.grow_for(left.len() + right.len())?;
        let left_ids: HashSet<NodeId> = left.nodes.iter().copied().collect();
        let mut emitted: HashSet<NodeId> = HashSet::with_capacity(left.len() + right.len());
        let (mut i, mut j) = (0_usize, 0_usize);
        while i < left.len() || j < right.len() {
            let take_left = match (left.scores.get(i), right.scores.get(j)) {
                // equal heads consume the left side first
                (Some(ls), Some(rs)) => ls >= rs,
                (Some(_), None) => true,
                _ => false,
            };
            if take_left {
                let (node, score) = (left.nodes[i], left.scores[i]);
                i += 1;
                if emitted.insert(node) {
                    merged.nodes.push(node);
                    merged.scores.push(score);
                }
            } else {
                let (node, score) = (right.nodes[j], right.scores[j]);
                j += 1;
                if !left_ids.contains(&node) && emitted.insert(node) {
                    merged.nodes.push(node);
                    merged.scores.push(score);
                }
            }
        }
        Ok(merged)
    }

    /// First index whose score is strictly below `score`. Equal scores sort
    /// before the incoming pair, which places ties at the end of their run.
    fn descending_insertion_point(&self, score: f32) -> usize {
        self.scores.partition_point(|&existing| existing >= score)
    }

    fn grow_for(&mut self, extra: usize) -> Result<()> {
        let requested = self.len() + extra;
        self.nodes
            .try_reserve(extra)
            .and_then(|()| self.scores.try_reserve(extra))
            .map_err(|_| NeighbourError::CapacityExceeded { requested })?;
        Ok(())
    }
}

/// A [`NeighbourArray`] that additionally rejects duplicate node ids.
///
/// Duplicates only arise in practice when two threads propose the same
/// `(node, score)` pair concurrently, so the duplicate scan is bounded by the
/// run of entries sharing the incoming score. Read operations are inherited
/// from the inner array via `Deref`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConcurrentNeighbourArray {
    inner: NeighbourArray,
}

impl ConcurrentNeighbourArray {
    /// Creates an empty array.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty array with room for `capacity` pairs.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: NeighbourArray::with_capacity(capacity),
        }
    }

    /// Wraps an array the caller guarantees to be deduplicated.
    pub(crate) fn from_unique(inner: NeighbourArray) -> Self {
        debug_assert!(
            {
                let unique: HashSet<NodeId> = inner.nodes.iter().copied().collect();
                unique.len() == inner.len()
            },
            "from_unique requires deduplicated input",
        );
        Self { inner }
    }

    /// Borrows the inner array.
    #[must_use]
    pub fn as_array(&self) -> &NeighbourArray {
        &self.inner
    }

    /// Inserts a pair at its sorted position unless the node is already
    /// present at that score; returns whether the pair was inserted.
    ///
    /// The presence check walks the run of entries whose score equals the
    /// incoming score, which is where a concurrent duplicate proposal would
    /// have landed.
    ///
    /// # Errors
    /// Returns [`NeighbourError::CapacityExceeded`] when the array cannot
    /// grow.
    pub fn insert_sorted(&mut self, node: NodeId, score: f32) -> Result<bool> {
        let index = self.inner.descending_insertion_point(score);
        let mut probe = index;
        while probe > 0 && self.inner.scores[probe - 1] == score {
            if self.inner.nodes[probe - 1] == node {
                return Ok(false);
            }
            probe -= 1;
        }
        self.inner.grow_for(1)?;
        self.inner.nodes.insert(index, node);
        self.inner.scores.insert(index, score);
        Ok(true)
    }
}

impl Deref for ConcurrentNeighbourArray {
    type Target = NeighbourArray;

    fn deref(&self) -> &NeighbourArray {
        &self.inner
    }
}
